//!
//! Per-Thread Initialization
//!
//! Embedded engines expect every OS thread that touches a connection to run
//! a one-time setup step first. The step is tracked with a thread-local flag
//! (set once, read thereafter) and surfaced as a `ThreadInit` token.
//!
//! The token is `!Send`: a connection that holds one cannot migrate to, or
//! be driven from, another thread.
//!

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static THREAD_INITIALIZED: Cell<bool> = const { Cell::new(false) };
}

#[derive(Debug, Clone)]
pub struct ThreadInit {
    _not_send: PhantomData<*const ()>,
}

impl ThreadInit {
    /// Initialize the current thread if needed and return its token.
    pub fn acquire() -> Self {
        THREAD_INITIALIZED.with(|flag| {
            if !flag.get() {
                flag.set(true);
            }
        });
        Self { _not_send: PhantomData }
    }

    pub fn is_initialized() -> bool {
        THREAD_INITIALIZED.with(|flag| flag.get())
    }
}
