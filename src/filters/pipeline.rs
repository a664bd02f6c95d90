//! # Filter chain builder.
//!
//! `Pipeline` turns a base handler plus its applicable filters into a
//! [`BoundHandler`]: the three call surfaces composed **once**, at
//! subscription time, from a single sorted filter set. Every publish then
//! reuses the prebuilt chains.
//!
//! Filters are collected in fixed precedence — global (from
//! [`Options`](crate::Options)), then declarative (from the
//! [`DeclarativeFilters`] collaborator, definitions cached per handler type),
//! then the filters passed explicitly at subscribe time — and sorted by
//! descending [`FilterOrder`](crate::FilterOrder) with a stable tie-break, so
//! equal orders keep that precedence. When no filter applies, the handler is
//! stored direct and dispatch pays no wrapping cost at all.

use std::any::TypeId;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Options;
use crate::error::HandleError;
use crate::filters::def::DefCache;
use crate::filters::filter::{AsyncCall, TokenCall};
use crate::filters::{DeclarativeFilters, Filter, FilterOrder, Next, NextWithToken};
use crate::handlers::{Handle, Message};

/// A handler with its filter chain bound, ready for dispatch.
pub(crate) enum BoundHandler<T: Message> {
    /// No filters apply: dispatch goes straight to the handler.
    Direct(Arc<dyn Handle<T>>),
    /// The three composed call surfaces.
    Filtered {
        sync_chain: Arc<dyn Fn(&T) + Send + Sync>,
        async_chain: Next<T>,
        token_chain: NextWithToken<T>,
    },
}

impl<T: Message> BoundHandler<T> {
    pub(crate) fn handle(&self, message: &T) {
        match self {
            BoundHandler::Direct(handler) => handler.handle(message),
            BoundHandler::Filtered { sync_chain, .. } => (sync_chain.as_ref())(message),
        }
    }

    pub(crate) async fn handle_async(&self, message: T) -> Result<(), HandleError> {
        match self {
            BoundHandler::Direct(handler) => handler.handle_async(message).await,
            BoundHandler::Filtered { async_chain, .. } => async_chain.run(message).await,
        }
    }

    pub(crate) async fn handle_with_token(
        &self,
        message: T,
        token: CancellationToken,
    ) -> Result<(), HandleError> {
        match self {
            BoundHandler::Direct(handler) => handler.handle_with_token(message, token).await,
            BoundHandler::Filtered { token_chain, .. } => token_chain.run(message, token).await,
        }
    }
}

/// Chain builder shared by every broker a factory creates.
pub(crate) struct Pipeline {
    options: Arc<Options>,
    declarative: Arc<dyn DeclarativeFilters>,
    cache: DefCache,
}

impl Pipeline {
    pub(crate) fn new(options: Arc<Options>, declarative: Arc<dyn DeclarativeFilters>) -> Self {
        Self {
            options,
            declarative,
            cache: DefCache::new(),
        }
    }

    /// Builds the bound handler for one subscription.
    ///
    /// `handler_type` is the concrete handler type's [`TypeId`], used to look
    /// up (and cache) its declarative filter definitions.
    pub(crate) fn bind<T: Message>(
        &self,
        handler: Arc<dyn Handle<T>>,
        handler_type: TypeId,
        explicit: Vec<Arc<dyn Filter<T>>>,
    ) -> BoundHandler<T> {
        let mut ranked: Vec<(FilterOrder, Arc<dyn Filter<T>>)> = Vec::new();

        for def in self.options.global_filters_for::<T>() {
            if let Some(filter) = def.instantiate::<T>() {
                ranked.push((def.order(), filter));
            }
        }
        let declared = self
            .cache
            .get_or_scan(handler_type, || self.declarative.filters_for(handler_type));
        for def in declared.iter() {
            if let Some(filter) = def.instantiate::<T>() {
                ranked.push((def.order(), filter));
            }
        }
        for filter in explicit {
            ranked.push((filter.order(), filter));
        }

        if ranked.is_empty() {
            return BoundHandler::Direct(handler);
        }

        // Stable descending sort: highest order outermost, equal orders keep
        // the global → declarative → explicit concatenation above.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let mut sync_chain: Arc<dyn Fn(&T) + Send + Sync> = {
            let handler = handler.clone();
            Arc::new(move |message: &T| handler.handle(message))
        };
        let mut async_chain: Next<T> = {
            let handler = handler.clone();
            let call: Arc<AsyncCall<T>> = Arc::new(move |message: T| {
                let handler = handler.clone();
                Box::pin(async move { handler.handle_async(message).await })
            });
            Next::new(call)
        };
        let mut token_chain: NextWithToken<T> = {
            let call: Arc<TokenCall<T>> =
                Arc::new(move |message: T, token: CancellationToken| {
                    let handler = handler.clone();
                    Box::pin(async move { handler.handle_with_token(message, token).await })
                });
            NextWithToken::new(call)
        };

        // Fold from the base handler outward: the lowest order wraps first
        // (innermost), the highest wraps last (outermost caller).
        for (_, filter) in ranked.into_iter().rev() {
            sync_chain = {
                let filter = filter.clone();
                let prev = sync_chain;
                Arc::new(move |message: &T| filter.handle(message, prev.as_ref()))
            };
            async_chain = {
                let filter = filter.clone();
                let prev = async_chain;
                let call: Arc<AsyncCall<T>> = Arc::new(move |message: T| {
                    let filter = filter.clone();
                    let prev = prev.clone();
                    Box::pin(async move { filter.handle_async(message, prev).await })
                });
                Next::new(call)
            };
            token_chain = {
                let prev = token_chain;
                let call: Arc<TokenCall<T>> =
                    Arc::new(move |message: T, token: CancellationToken| {
                        let filter = filter.clone();
                        let prev = prev.clone();
                        Box::pin(async move { filter.handle_with_token(message, token, prev).await })
                    });
                NextWithToken::new(call)
            };
        }

        BoundHandler::Filtered {
            sync_chain,
            async_chain,
            token_chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::filters::{FilterDef, NoDeclarativeFilters, PredicateFilter};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Handle<u32> for Recorder {
        fn handle(&self, _message: &u32) {
            self.log.lock().unwrap().push(self.name);
        }

        async fn handle_async(&self, _message: u32) -> Result<(), HandleError> {
            self.log.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    struct Tracer {
        name: &'static str,
        order: FilterOrder,
        log: Log,
    }

    #[async_trait]
    impl Filter<u32> for Tracer {
        fn order(&self) -> FilterOrder {
            self.order
        }

        fn handle(&self, message: &u32, next: &dyn Fn(&u32)) {
            self.log.lock().unwrap().push(self.name);
            next(message)
        }

        async fn handle_async(&self, message: u32, next: Next<u32>) -> Result<(), HandleError> {
            self.log.lock().unwrap().push(self.name);
            next.run(message).await
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(Options::default()), Arc::new(NoDeclarativeFilters))
    }

    fn tracer(name: &'static str, order: i32, log: &Log) -> Arc<dyn Filter<u32>> {
        Arc::new(Tracer {
            name,
            order: FilterOrder::At(order),
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn test_wrap_order_is_descending_regardless_of_declaration_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let base = Arc::new(Recorder {
            name: "base",
            log: log.clone(),
        });

        let bound = pipeline().bind(
            base,
            TypeId::of::<Recorder>(),
            vec![
                tracer("f5", 5, &log),
                tracer("f1", 1, &log),
                tracer("f3", 3, &log),
            ],
        );

        bound.handle_async(0).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["f5", "f3", "f1", "base"]);

        log.lock().unwrap().clear();
        bound.handle(&0);
        assert_eq!(*log.lock().unwrap(), vec!["f5", "f3", "f1", "base"]);
    }

    #[tokio::test]
    async fn test_equal_orders_keep_global_before_explicit() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut options = Options::default();
        {
            let log = log.clone();
            options.add_global_filter::<u32, _>(FilterOrder::At(7), move || {
                Arc::new(Tracer {
                    name: "global",
                    order: FilterOrder::At(7),
                    log: log.clone(),
                })
            });
        }
        let pipeline = Pipeline::new(Arc::new(options), Arc::new(NoDeclarativeFilters));

        let base = Arc::new(Recorder {
            name: "base",
            log: log.clone(),
        });
        let bound = pipeline.bind(
            base,
            TypeId::of::<Recorder>(),
            vec![tracer("e1", 7, &log), tracer("e2", 7, &log)],
        );

        bound.handle_async(0).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["global", "e1", "e2", "base"]);
    }

    #[test]
    fn test_no_filters_binds_direct() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let base = Arc::new(Recorder {
            name: "base",
            log,
        });
        let bound = pipeline().bind(base, TypeId::of::<Recorder>(), Vec::new());
        assert!(matches!(bound, BoundHandler::Direct(_)));
    }

    #[tokio::test]
    async fn test_predicate_gates_after_other_filters_observe() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let base = Arc::new(Recorder {
            name: "base",
            log: log.clone(),
        });

        let bound = pipeline().bind(
            base,
            TypeId::of::<Recorder>(),
            vec![
                tracer("seen", 1, &log),
                Arc::new(PredicateFilter::new(|m: &u32| *m > 10)),
            ],
        );

        bound.handle_async(3).await.unwrap();
        // The tracer observed the message; the gate stopped the handler.
        assert_eq!(*log.lock().unwrap(), vec!["seen"]);

        log.lock().unwrap().clear();
        bound.handle_async(42).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["seen", "base"]);
    }

    #[tokio::test]
    async fn test_declarative_definitions_are_scanned_once_per_type() {
        struct Declaring;

        struct CountingSource {
            scans: Arc<AtomicUsize>,
            log: Log,
        }

        impl DeclarativeFilters for CountingSource {
            fn filters_for(&self, handler: TypeId) -> Option<Vec<FilterDef>> {
                self.scans.fetch_add(1, Ordering::SeqCst);
                if handler != TypeId::of::<Declaring>() {
                    return None;
                }
                let log = self.log.clone();
                Some(vec![FilterDef::new::<u32, _>(FilterOrder::At(2), move || {
                    Arc::new(Tracer {
                        name: "declared",
                        order: FilterOrder::At(2),
                        log: log.clone(),
                    })
                })])
            }
        }

        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let scans = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(
            Arc::new(Options::default()),
            Arc::new(CountingSource {
                scans: scans.clone(),
                log: log.clone(),
            }),
        );

        for _ in 0..2 {
            let base = Arc::new(Recorder {
                name: "base",
                log: log.clone(),
            });
            let bound = pipeline.bind(base, TypeId::of::<Declaring>(), Vec::new());
            bound.handle_async(0).await.unwrap();
        }

        assert_eq!(scans.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["declared", "base", "declared", "base"]
        );
    }
}
