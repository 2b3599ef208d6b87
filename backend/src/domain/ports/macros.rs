//! Helper macro for generating domain port error enums.
//!
//! Port errors all share the same shape: a handful of variants each carrying
//! a human-readable message. The macro derives the enum, its `thiserror`
//! display strings, and snake_case convenience constructors.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { message: String },
            )*
        }

        impl $name {
            ::paste::paste! {
                $(
                    pub fn [<$variant:snake>](message: impl Into<String>) -> Self {
                        Self::$variant { message: message.into() }
                    }
                )*
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    define_port_error! {
        pub enum ExamplePortError {
            Connection => "connection failed: {message}",
            Query => "query failed: {message}",
        }
    }

    #[test]
    fn constructors_accept_str_for_message() {
        let err = ExamplePortError::connection("refused");
        assert_eq!(err.to_string(), "connection failed: refused");
        assert!(matches!(err, ExamplePortError::Connection { .. }));
    }

    #[test]
    fn variants_format_their_message() {
        let err = ExamplePortError::query("syntax");
        assert_eq!(err.to_string(), "query failed: syntax");
    }
}
