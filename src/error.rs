use std::{error::Error, fmt, io};

use backtrace::Backtrace;

/// The failure class of a [`MinnowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The lock manager gave up acquiring a page lock; the transaction must
    /// be aborted by its driver.
    TransactionAborted,

    /// A semantic fault: occupied slot on insert, empty slot on delete,
    /// eviction of an all-dirty pool, a corrupted page image.
    Database,

    /// A disk read or write failed.
    Io,

    /// An argument was out of range or mismatched a schema.
    InvalidArgument,
}

pub struct MinnowError {
    kind: ErrorKind,
    message: String,
    backtrace: Backtrace,
}

impl MinnowError {
    pub fn new(kind: ErrorKind, msg: &str) -> Self {
        Self {
            kind,
            message: msg.to_string(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn abort() -> Self {
        Self::new(
            ErrorKind::TransactionAborted,
            "lock acquisition gave up, transaction should abort",
        )
    }

    pub fn db(msg: &str) -> Self {
        Self::new(ErrorKind::Database, msg)
    }

    pub fn io(context: &str, e: io::Error) -> Self {
        Self::new(ErrorKind::Io, &format!("{}: {}", context, e))
    }

    pub fn invalid_arg(msg: &str) -> Self {
        Self::new(ErrorKind::InvalidArgument, msg)
    }

    pub fn get_kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_abort(&self) -> bool {
        self.kind == ErrorKind::TransactionAborted
    }

    pub fn show_backtrace(&self) {
        let mut resolved = self.backtrace.clone();
        resolved.resolve();
        log::error!("{}\nbacktrace:\n{:?}", self, resolved);
    }
}

impl fmt::Display for MinnowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl fmt::Debug for MinnowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Error for MinnowError {}
