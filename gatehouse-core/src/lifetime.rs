//! Strategy lifetimes.
//!
//! The composing application chooses how long a strategy instance lives:
//!
//! | Lifetime | Instances |
//! |----------|-----------|
//! | [`PerProcess`](StrategyLifetime::PerProcess) | one, created at registration and shared by every request |
//! | [`PerRequest`](StrategyLifetime::PerRequest) | one per request, shared by every check within that request |
//! | [`PerCall`](StrategyLifetime::PerCall) | a fresh instance for every check |
//!
//! A [`StrategyProvider`] holds the registration; a [`ScopedStrategy`] is
//! the per-request view that hands out instances according to the lifetime.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// How long a strategy instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyLifetime {
    #[default]
    PerProcess,
    PerRequest,
    PerCall,
}

impl fmt::Display for StrategyLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyLifetime::PerProcess => f.write_str("per_process"),
            StrategyLifetime::PerRequest => f.write_str("per_request"),
            StrategyLifetime::PerCall => f.write_str("per_call"),
        }
    }
}

type Factory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

enum Source<T: ?Sized> {
    Shared(Arc<T>),
    Factory(StrategyLifetime, Factory<T>),
}

/// A registered strategy together with its lifetime.
///
/// `T` is usually a trait object such as `dyn ResourceAccessStrategy`.
pub struct StrategyProvider<T: ?Sized> {
    source: Source<T>,
}

impl<T: ?Sized + Send + Sync + 'static> StrategyProvider<T> {
    /// A process-wide instance.
    pub fn singleton(instance: Arc<T>) -> Self {
        Self {
            source: Source::Shared(instance),
        }
    }

    /// Register a factory with the given lifetime.
    ///
    /// For [`StrategyLifetime::PerProcess`] the factory runs once, right away.
    pub fn from_factory<F>(lifetime: StrategyLifetime, factory: F) -> Self
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        match lifetime {
            StrategyLifetime::PerProcess => Self::singleton(factory()),
            other => Self {
                source: Source::Factory(other, Arc::new(factory)),
            },
        }
    }

    pub fn lifetime(&self) -> StrategyLifetime {
        match &self.source {
            Source::Shared(_) => StrategyLifetime::PerProcess,
            Source::Factory(lifetime, _) => *lifetime,
        }
    }

    /// Open a per-request view of this provider.
    pub fn scope(&self) -> ScopedStrategy<T> {
        ScopedStrategy {
            provider: self.clone(),
            instance: OnceLock::new(),
        }
    }
}

impl<T: ?Sized> Clone for StrategyProvider<T> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            Source::Shared(instance) => Source::Shared(instance.clone()),
            Source::Factory(lifetime, factory) => Source::Factory(*lifetime, factory.clone()),
        };
        Self { source }
    }
}

impl<T: ?Sized> fmt::Debug for StrategyProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifetime = match &self.source {
            Source::Shared(_) => StrategyLifetime::PerProcess,
            Source::Factory(lifetime, _) => *lifetime,
        };
        f.debug_struct("StrategyProvider")
            .field("lifetime", &lifetime)
            .finish()
    }
}

/// Per-request handle on a [`StrategyProvider`].
pub struct ScopedStrategy<T: ?Sized> {
    provider: StrategyProvider<T>,
    instance: OnceLock<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ScopedStrategy<T> {
    /// The instance to use for the next call.
    pub fn get(&self) -> Arc<T> {
        match &self.provider.source {
            Source::Shared(instance) => instance.clone(),
            Source::Factory(StrategyLifetime::PerCall, factory) => factory(),
            Source::Factory(_, factory) => self.instance.get_or_init(|| factory()).clone(),
        }
    }

    pub fn lifetime(&self) -> StrategyLifetime {
        self.provider.lifetime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_factory(
        lifetime: StrategyLifetime,
    ) -> (StrategyProvider<AtomicUsize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let provider = StrategyProvider::from_factory(lifetime, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(AtomicUsize::new(0))
        });
        (provider, created)
    }

    #[test]
    fn per_process_creates_once_eagerly() {
        let (provider, created) = counting_factory(StrategyLifetime::PerProcess);
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let a = provider.scope();
        let b = provider.scope();
        assert!(Arc::ptr_eq(&a.get(), &b.get()));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn per_request_creates_once_per_scope() {
        let (provider, created) = counting_factory(StrategyLifetime::PerRequest);
        assert_eq!(created.load(Ordering::SeqCst), 0);

        let scope = provider.scope();
        assert!(Arc::ptr_eq(&scope.get(), &scope.get()));
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let other = provider.scope();
        assert!(!Arc::ptr_eq(&scope.get(), &other.get()));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn per_call_creates_every_time() {
        let (provider, created) = counting_factory(StrategyLifetime::PerCall);
        let scope = provider.scope();
        scope.get();
        scope.get();
        scope.get();
        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(scope.lifetime(), StrategyLifetime::PerCall);
    }
}
