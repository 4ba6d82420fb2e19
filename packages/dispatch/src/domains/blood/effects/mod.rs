pub mod dispatch;

pub use dispatch::DispatchExecutor;
