// Reporting models (wire format for the HTTP and WebSocket routes)

mod disk;

pub use disk::DiskSnapshot;
