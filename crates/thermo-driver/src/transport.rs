//! 共享串口
//!
//! 遥测循环和握手都要访问同一个串口。这里用一把互斥锁保证访问是独占的：
//! 遥测循环每次只持锁读一行（受读超时约束），握手持锁完成整个交换。
//! 会话结束时串口被取出（`release`），之后的访问都会得到 `TransportClosed`。

use crate::error::DriverError;
use parking_lot::Mutex;
use std::sync::Arc;

/// 可在线程间共享的串口槽位
#[derive(Debug)]
pub struct SharedTransport<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for SharedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> SharedTransport<T> {
    pub fn new(transport: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(transport))),
        }
    }

    /// 持锁执行 `f`
    ///
    /// 锁在 `f` 返回后释放。串口已被释放时返回 `TransportClosed`。
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut T) -> Result<R, DriverError>,
    ) -> Result<R, DriverError> {
        let mut guard = self.slot.lock();
        let transport = guard.as_mut().ok_or(DriverError::TransportClosed)?;
        f(transport)
    }

    /// 取出串口（会话结束）
    ///
    /// 会等待正在进行的访问结束。第二次调用返回 `None`。
    pub fn release(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_with_and_release() {
        let shared = SharedTransport::new(5u32);
        assert_eq!(shared.with(|v| Ok(*v + 1)).unwrap(), 6);
        assert!(shared.is_open());

        assert_eq!(shared.release(), Some(5));
        assert!(!shared.is_open());
        assert!(matches!(shared.with(|v| Ok(*v)), Err(DriverError::TransportClosed)));
        assert_eq!(shared.release(), None);
    }

    #[test]
    fn test_access_is_exclusive() {
        let shared = SharedTransport::new(Vec::<u32>::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared
                        .with(|log| {
                            log.push(i);
                            thread::sleep(Duration::from_millis(5));
                            log.push(i);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let log = shared.release().unwrap();
        assert_eq!(log.len(), 8);
        // 每个线程的两次写入必须相邻
        for pair in log.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }
}
