//! Thread scheduling-policy helpers.
//!
//! Routing threads can be promoted to a fixed-priority realtime policy to
//! reduce forwarding jitter. Promotion normally requires elevated privilege;
//! callers treat failure as non-fatal and stay on the default policy.

use std::os::unix::thread::RawPthread;

/// The current thread's raw pthread handle.
pub fn current_thread() -> RawPthread {
    unsafe { libc::pthread_self() }
}

/// Promotes `handle` to `SCHED_FIFO` at the maximum priority the platform
/// reports (priority 1 if it reports none). Returns whether the policy
/// change took effect.
pub fn set_realtime(handle: RawPthread) -> bool {
    let max = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
    let param = libc::sched_param {
        // FIFO priorities start at 1.
        sched_priority: if max > 0 { max } else { 1 },
    };
    unsafe { libc::pthread_setschedparam(handle, libc::SCHED_FIFO, &param) == 0 }
}

/// Whether `handle` currently runs under a realtime policy.
pub fn is_realtime(handle: RawPthread) -> bool {
    match sched_params(handle) {
        Some((policy, _)) => policy == libc::SCHED_FIFO || policy == libc::SCHED_RR,
        None => false,
    }
}

/// The scheduling priority of `handle`, if it can be queried.
pub fn current_priority(handle: RawPthread) -> Option<i32> {
    sched_params(handle).map(|(_, priority)| priority)
}

fn sched_params(handle: RawPthread) -> Option<(libc::c_int, libc::c_int)> {
    let mut policy: libc::c_int = 0;
    let mut param = libc::sched_param { sched_priority: 0 };
    let res = unsafe { libc::pthread_getschedparam(handle, &mut policy, &mut param) };
    if res == 0 {
        Some((policy, param.sched_priority))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_thread_priority_is_queryable() {
        assert!(current_priority(current_thread()).is_some());
    }

    #[test]
    fn default_policy_is_not_realtime() {
        assert!(!is_realtime(current_thread()));
    }
}
