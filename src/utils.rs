use std::sync::{Once, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A handy shortcut for the `RwLock` read()/write().unwrap() pattern.
///
/// (The pattern is borrowed from tikv_util.)
pub trait HandyRwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

static LOG_INIT: Once = Once::new();

/// Set up env_logger once for the whole process. Safe to call from every
/// test.
pub fn init_log() {
    LOG_INIT.call_once(|| {
        use std::io::Write;

        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} - {}] [{}:{}] {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or("?"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .is_test(true)
            .try_init()
            .ok();
    });
}

/// Integer division rounding towards positive infinity.
pub fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}
