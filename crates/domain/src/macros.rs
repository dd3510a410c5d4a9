//! Macro for implementing Display and FromStr for status enums
//!
//! Status-like enums are stored as text columns, so every one of them needs
//! the same pair of conversions. The macro keeps the stored spelling in one
//! place.
//!
//! # Example
//!
//! ```rust
//! use timekeep_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum PushState {
//!     Queued,
//!     Sent,
//! }
//!
//! impl_domain_status_conversions!(PushState {
//!     Queued => "QUEUED",
//!     Sent => "SENT",
//! });
//!
//! assert_eq!(PushState::Sent.to_string(), "SENT");
//! assert_eq!("queued".parse::<PushState>().unwrap(), PushState::Queued);
//! ```

/// Implements Display and FromStr traits for status enums
///
/// - `Display` writes the mapped string exactly as given
/// - `FromStr` matches the mapped string ignoring ASCII case
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return ::std::result::Result::Ok(Self::$variant);
                    }
                )+
                ::std::result::Result::Err(::std::format!(
                    "Invalid {}: {}",
                    ::std::stringify!($enum_name),
                    s
                ))
            }
        }
    };
}
