//! 核心宏定义
//!
//! 配置类型共用的宏

/// 为结构体实现Default trait的宏
///
/// 配置结构体用它声明默认值:
/// ```rust
/// use engine_interop::impl_default;
///
/// struct ShardConfig {
///     shards: usize,
///     label: String,
/// }
///
/// impl_default!(ShardConfig {
///     shards: 16,
///     label: String::from("registry"),
/// });
///
/// assert_eq!(ShardConfig::default().shards, 16);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}
