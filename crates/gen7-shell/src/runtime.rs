use std::time::Duration;

use futures::future::LocalBoxFuture;

/// The single cooperative event loop the shell runs on.
///
/// Everything the engine schedules is `!Send`: DOM handles, `Rc` state and
/// host promises all live on the one UI thread.
pub trait ShellRuntime {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}
