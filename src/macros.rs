#![allow(unused_macros)]

// Diagnostic shims: with the `tracing` feature off, the arguments are
// type-checked but never evaluated, so the crate carries no logging
// dependency and no secret can reach a sink by accident.
macro_rules! log {
    ($level: ident, $($t:tt)*) => {
        #[cfg(feature = "tracing")]
        { tracing::$level!($($t)*) }
        #[cfg(not(feature = "tracing"))]
        { if false { let _ = ( $($t)* ); } }
    }
}

macro_rules! trace {
    ($($t:tt)*) => { log!(trace, $($t)*) }
}

macro_rules! debug {
    ($($t:tt)*) => { log!(debug, $($t)*) }
}

macro_rules! warn {
    ($($t:tt)*) => { log!(warn, $($t)*) }
}
