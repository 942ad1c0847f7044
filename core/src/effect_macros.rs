//! Declarative macros for ergonomic effect construction
//!
//! Reducers build most of their I/O as `Effect::Future` around an async block;
//! these macros keep that boilerplate out of the match arms.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use passline_core::async_effect;
///
/// async_effect! {
///     let events = catalog.list_events().await.ok()?;
///     Some(CatalogAction::EventsLoaded { events })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use passline_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(2),
///     action: CheckoutAction::AlertDismissed
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
