use futures::Future;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

struct SemaphoreState {
  permits: usize,
  wakers: Vec<Waker>,
}

/// A permit from a [`Semaphore`]. The permit is given back on drop,
/// which covers early returns, errors and panics alike.
pub struct SemaphorePermit(Arc<Semaphore>);

impl Drop for SemaphorePermit {
  fn drop(&mut self) {
    self.0.release();
  }
}

/// Counting admission gate that bounds how many jobs run at once.
pub struct Semaphore {
  state: Mutex<SemaphoreState>,
}

impl Semaphore {
  pub fn new(permits: usize) -> Self {
    Self {
      state: Mutex::new(SemaphoreState {
        permits,
        wakers: Vec::new(),
      }),
    }
  }

  pub fn acquire(self: &Arc<Self>) -> impl Future<Output = SemaphorePermit> + Send + 'static {
    AcquireFuture { semaphore: self.clone() }
  }

  #[cfg(test)]
  pub fn available_permits(&self) -> usize {
    self.state.lock().permits
  }

  fn release(&self) {
    let wakers = {
      let mut state = self.state.lock();
      state.permits += 1;
      // wake everyone waiting because a woken future may have been dropped
      // in the meantime and would otherwise swallow the wake up
      std::mem::take(&mut state.wakers)
    };

    for waker in wakers {
      waker.wake();
    }
  }
}

struct AcquireFuture {
  semaphore: Arc<Semaphore>,
}

impl Future for AcquireFuture {
  type Output = SemaphorePermit;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.semaphore.state.lock();

    if state.permits > 0 {
      state.permits -= 1;
      Poll::Ready(SemaphorePermit(self.semaphore.clone()))
    } else {
      if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
        state.wakers.push(cx.waker().clone());
      }
      Poll::Pending
    }
  }
}
