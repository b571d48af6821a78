//! Global tuning parameters that can be overridden from environment variables.
//!
//! An [`EnvParam`] is declared as a `static` with the name of an environment variable
//! and the textual representation of its default value. The value is parsed lazily,
//! on first access, and never re-read afterwards.
//!
//! It is meant for internal knobs of an algorithm that are too specialized to be exposed
//! as command line options but that one may want to tweak when experimenting.
//!
//! ```
//! use env_param::EnvParam;
//! static QUEUE_SIZE: EnvParam<u32> = EnvParam::new("TEMPO_DOC_QUEUE_SIZE", "16");
//!
//! // environment variable not set, the default value is used
//! assert_eq!(QUEUE_SIZE.get(), 16);
//! ```
//!
//! When the environment variable is set before the first access, its value is used instead.
//!
//! ```
//! use env_param::EnvParam;
//! static VERBOSE: EnvParam<bool> = EnvParam::new("TEMPO_DOC_VERBOSE", "false");
//!
//! std::env::set_var("TEMPO_DOC_VERBOSE", "true");
//! assert!(VERBOSE.get());
//! ```
//!
//! Since the value is cached, changing the environment afterwards has no effect.
//! [`EnvParam::set`] forces the value programmatically and fails if the parameter was already read.

use std::fmt::{Debug, Formatter};
use std::str::FromStr;

pub struct EnvParam<T> {
    value: once_cell::sync::OnceCell<T>,
    env: &'static str,
    default: &'static str,
}

impl<T> EnvParam<T> {
    /// Declares a parameter read from the environment variable `env`, falling back to `default`
    /// when the variable is absent or cannot be parsed.
    pub const fn new(env: &'static str, default: &'static str) -> EnvParam<T> {
        EnvParam {
            value: once_cell::sync::OnceCell::new(),
            env,
            default,
        }
    }

    /// Name of the environment variable backing this parameter.
    pub fn name(&self) -> &'static str {
        self.env
    }

    /// Textual representation of the default value.
    pub fn default_value(&self) -> &'static str {
        self.default
    }

    /// Returns true if the parameter has already been read or set.
    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: FromStr> EnvParam<T> {
    fn parse_default(&self) -> T {
        match T::from_str(self.default) {
            Ok(v) => v,
            Err(_) => panic!("[env_param] {}: invalid default value \"{}\".", self.env, self.default),
        }
    }

    fn read(&self) -> T {
        match std::env::var(self.env) {
            Ok(raw) => match T::from_str(&raw) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(
                        "[env_param] could not parse \"{raw}\" for {}, using default \"{}\"",
                        self.env,
                        self.default
                    );
                    self.parse_default()
                }
            },
            Err(std::env::VarError::NotPresent) => self.parse_default(),
            Err(err) => {
                tracing::warn!("[env_param] {}: {err}, using default \"{}\"", self.env, self.default);
                self.parse_default()
            }
        }
    }

    /// Returns a copy of the parameter's value, reading the environment on first access.
    ///
    /// # Panic
    /// Panics if the variable is unset (or unparsable) and the default value cannot be parsed.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.get_ref()
    }

    /// Returns the parameter's value, reading the environment on first access.
    ///
    /// # Panic
    /// Panics if the variable is unset (or unparsable) and the default value cannot be parsed.
    pub fn get_ref(&self) -> &T {
        self.value.get_or_init(|| self.read())
    }

    /// Forces the value of the parameter.
    ///
    /// # Panic
    /// Panics if the parameter is already initialized, which typically means that it was already read.
    pub fn set(&self, value: T) {
        if self.value.set(value).is_err() {
            panic!("Parameter {} is already initialized (i.e. was previously accessed).", self.env);
        }
    }
}

impl<T: Debug> Debug for EnvParam<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.value.get() {
            Some(v) => write!(f, "{}={v:?}", self.env),
            None => write!(f, "{}=<unread, default \"{}\">", self.env, self.default),
        }
    }
}
