use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("already exists")]
    AlreadyExists,

    #[error("storage full")]
    StorageFull,

    #[error("path has no file name")]
    NoFileName,

    #[error("i/o failure: {0}")]
    Io(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn from_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound,
        io::ErrorKind::PermissionDenied => Error::PermissionDenied,
        io::ErrorKind::AlreadyExists => Error::AlreadyExists,
        io::ErrorKind::StorageFull => Error::StorageFull,
        _ => Error::Io(err),
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self { from_io(err) }
}
