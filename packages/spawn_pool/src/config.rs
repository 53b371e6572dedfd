use std::fmt::Debug;

use tracing::warn;

const DEFAULT_INITIAL_SIZE: usize = 5;
const DEFAULT_MAX_EXPAND_SIZE: usize = 20;

/// The sizing policy of one pool kind.
///
/// After validation, `1 <= initial_size <= max_expand_size` always holds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PoolSettings {
    initial_size: usize,
    auto_expand: bool,
    max_expand_size: usize,
}

impl PoolSettings {
    /// How many instances are created when the pool is initialized.
    #[must_use]
    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    /// Whether the pool may create more instances when it runs out of inactive ones.
    #[must_use]
    pub fn auto_expand(&self) -> bool {
        self.auto_expand
    }

    /// The most instances the pool may ever hold if it expands.
    ///
    /// Has no effect when [`auto_expand()`][Self::auto_expand] is `false`; such a pool
    /// always holds exactly [`initial_size()`][Self::initial_size] instances.
    #[must_use]
    pub fn max_expand_size(&self) -> usize {
        self.max_expand_size
    }

    /// The number of instances this pool will never exceed.
    #[must_use]
    pub fn capacity_limit(&self) -> usize {
        if self.auto_expand {
            self.max_expand_size
        } else {
            self.initial_size
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            auto_expand: false,
            max_expand_size: DEFAULT_MAX_EXPAND_SIZE,
        }
    }
}

/// Configuration of one pool kind: its payload template and sizing policy.
///
/// The defaults are an initial size of 5, no automatic expansion and a maximum expanded size
/// of 20. A template must be set before the pool can be initialized.
///
/// # Examples
///
/// ```
/// use spawn_pool::{FactoryError, PoolConfig};
///
/// let config = PoolConfig::new("bullet")
///     .template(|| -> Result<u32, FactoryError> { Ok(0) })
///     .initial_size(10)
///     .auto_expand(true)
///     .max_expand_size(100);
///
/// assert_eq!(config.kind(), "bullet");
/// assert_eq!(config.settings().initial_size(), 10);
/// assert!(config.has_template());
/// ```
#[derive(Debug)]
#[must_use]
pub struct PoolConfig<K, F> {
    kind: K,
    template: Option<F>,
    settings: PoolSettings,
}

impl<K: Copy, F> PoolConfig<K, F> {
    /// Starts configuring a pool of the given kind with default settings and no template.
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            template: None,
            settings: PoolSettings::default(),
        }
    }

    /// Sets the payload template, which creates every instance of this kind.
    pub fn template(mut self, template: F) -> Self {
        self.template = Some(template);
        self
    }

    /// Sets how many instances are created up front.
    ///
    /// Values below 1 are raised to 1 during validation.
    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.settings.initial_size = initial_size;
        self
    }

    /// Sets whether the pool may grow when it runs out of inactive instances.
    pub fn auto_expand(mut self, auto_expand: bool) -> Self {
        self.settings.auto_expand = auto_expand;
        self
    }

    /// Sets how many instances the pool may hold after growing.
    ///
    /// Values below 1 are raised to 1 during validation, and values below the initial size
    /// are raised to the initial size.
    pub fn max_expand_size(mut self, max_expand_size: usize) -> Self {
        self.settings.max_expand_size = max_expand_size;
        self
    }

    /// The pool kind being configured.
    #[must_use]
    pub fn kind(&self) -> K {
        self.kind
    }

    /// The sizing policy, as validated so far.
    #[must_use]
    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Whether a payload template has been set.
    #[must_use]
    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    pub(crate) fn into_parts(self) -> (K, Option<F>, PoolSettings) {
        (self.kind, self.template, self.settings)
    }
}

impl<K: Copy + Debug, F> PoolConfig<K, F> {
    /// Clamps out-of-range settings and reports every adjustment made, plus a missing template.
    fn validate(&mut self, warnings: &mut Vec<ConfigWarning>) {
        let kind = format!("{:?}", self.kind);

        if self.settings.initial_size < 1 {
            self.settings.initial_size = 1;
            warnings.push(ConfigWarning::InitialSizeClamped { kind: kind.clone() });
        }

        if self.settings.max_expand_size < 1 {
            self.settings.max_expand_size = 1;
            warnings.push(ConfigWarning::MaxExpandSizeClamped { kind: kind.clone() });
        }

        if self.settings.max_expand_size < self.settings.initial_size {
            self.settings.max_expand_size = self.settings.initial_size;
            warnings.push(ConfigWarning::MaxExpandSizeRaised {
                kind: kind.clone(),
                max_expand_size: self.settings.max_expand_size,
            });
        }

        if self.template.is_none() {
            warnings.push(ConfigWarning::MissingTemplate { kind });
        }
    }
}

/// A problem found while validating pool configuration.
///
/// Warnings never stop a pool from being created: out-of-range sizes are corrected and a
/// missing template only becomes an error when the pool is initialized.
#[derive(Clone, Debug, Eq, Hash, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum ConfigWarning {
    /// The initial size was below 1 and has been set to 1.
    #[display("the size of pool '{kind}' must be greater than 0, using 1")]
    InitialSizeClamped {
        /// The affected pool kind, formatted with its `Debug` representation.
        kind: String,
    },

    /// The maximum expanded size was below 1 and has been set to 1.
    #[display("the max size of pool '{kind}' must be greater than 0, using 1")]
    MaxExpandSizeClamped {
        /// The affected pool kind, formatted with its `Debug` representation.
        kind: String,
    },

    /// The maximum expanded size was below the initial size and has been raised to it.
    #[display(
        "the max size of pool '{kind}' must not be less than its initial size, using {max_expand_size}"
    )]
    MaxExpandSizeRaised {
        /// The affected pool kind, formatted with its `Debug` representation.
        kind: String,

        /// The maximum expanded size now in effect.
        max_expand_size: usize,
    },

    /// No payload template was set. Initializing the pool will fail.
    #[display("the template of pool '{kind}' is not set")]
    MissingTemplate {
        /// The affected pool kind, formatted with its `Debug` representation.
        kind: String,
    },
}

/// The ordered list of pool kinds a [`Pooler`][crate::Pooler] is initialized from.
///
/// # Examples
///
/// ```
/// use spawn_pool::{BoxedFactory, PoolConfig, PoolRegistry};
///
/// let ship: BoxedFactory<String> = Box::new(|| Ok("ship".to_string()));
///
/// let mut registry = PoolRegistry::new()
///     .with_pool(PoolConfig::new("ship").template(ship))
///     .with_pool(PoolConfig::new("rock").initial_size(0));
///
/// // The rock pool has no template and an invalid size.
/// let warnings = registry.validate();
/// assert_eq!(warnings.len(), 2);
/// assert_eq!(registry.configs()[1].settings().initial_size(), 1);
/// ```
#[derive(Debug)]
#[must_use]
pub struct PoolRegistry<K, F> {
    configs: Vec<PoolConfig<K, F>>,
}

impl<K, F> PoolRegistry<K, F> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            configs: Vec::new(),
        }
    }

    /// Adds a pool kind to the registry.
    pub fn with_pool(mut self, config: PoolConfig<K, F>) -> Self {
        self.configs.push(config);
        self
    }

    /// Adds a pool kind to the registry.
    pub fn push(&mut self, config: PoolConfig<K, F>) {
        self.configs.push(config);
    }

    /// The configured pool kinds, in registration order.
    #[must_use]
    pub fn configs(&self) -> &[PoolConfig<K, F>] {
        &self.configs
    }

    /// The number of configured pool kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether no pool kinds are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub(crate) fn into_configs(self) -> Vec<PoolConfig<K, F>> {
        self.configs
    }
}

impl<K: Copy + Debug, F> PoolRegistry<K, F> {
    /// Checks every pool configuration, correcting out-of-range sizes in place.
    ///
    /// For each pool kind, in order:
    ///
    /// * an initial size below 1 is set to 1;
    /// * a maximum expanded size below 1 is set to 1;
    /// * a maximum expanded size below the initial size is raised to the initial size;
    /// * a missing template is reported but left for initialization to reject.
    ///
    /// Every adjustment is logged as a warning and returned. Validating an already valid
    /// registry returns only the missing template warnings, if any.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for config in &mut self.configs {
            config.validate(&mut warnings);
        }

        for warning in &warnings {
            warn!("{warning}");
        }

        warnings
    }
}

impl<K, F> Default for PoolRegistry<K, F> {
    fn default() -> Self {
        Self::new()
    }
}
