//! 核心宏定义
//!
//! 提供统一的宏来减少代码重复

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use quad_particles::impl_default;
///
/// struct BufferLimits {
///     min_capacity: usize,
///     label: String,
/// }
///
/// impl_default!(BufferLimits {
///     min_capacity: 16,
///     label: String::from("particles"),
/// });
///
/// assert_eq!(BufferLimits::default().min_capacity, 16);
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

#[cfg(test)]
mod tests {

    struct Limits {
        floor: usize,
        label: String,
    }

    impl_default!(Limits {
        floor: 5,
        label: String::from("static"),
    });

    #[test]
    fn test_impl_default() {
        let limits = Limits::default();

        assert_eq!(limits.floor, 5);
        assert_eq!(limits.label, "static");
    }
}
