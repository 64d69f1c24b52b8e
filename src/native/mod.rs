//! 原生后端
//!
//! - `heap` - 进程内引用计数对象堆，供嵌入与测试使用
//! - `library` - 通过 libloading 加载的引擎共享库

pub mod heap;
pub mod library;

pub use heap::NativeHeap;
pub use library::NativeLibrary;
