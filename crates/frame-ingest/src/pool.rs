use std::sync::Mutex;

/// Small recycling pool so steady-state streaming does not reallocate a
/// frame buffer per capture.
pub(crate) struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Hand out an empty buffer, reusing a released allocation when one is
    /// available.
    pub(crate) fn checkout(&self) -> Vec<u8> {
        let recycled = match self.buffers.lock() {
            Ok(mut pool) => pool.pop(),
            Err(_) => None,
        };
        let mut buf = recycled.unwrap_or_default();
        buf.clear();
        buf
    }

    /// Take a buffer back. Buffers beyond the pool capacity are dropped.
    pub(crate) fn restore(&self, buf: Vec<u8>) {
        if let Ok(mut pool) = self.buffers.lock() {
            if pool.len() < self.capacity {
                pool.push(buf);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.buffers.lock().map(|pool| pool.len()).unwrap_or(0)
    }
}
