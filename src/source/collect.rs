use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Product;

/// Upper bound on the up-front allocation taken from `Collector::expect`.
const MAX_RESERVE: usize = 1 << 16;

/// Single drain task behind a bounded channel. Producers block on `send`
/// while the channel is full; order is preserved end to end.
pub struct Collector {
    handle: JoinHandle<Vec<Product>>,
    expected: Option<oneshot::Sender<usize>>,
}

impl Collector {
    pub fn spawn(capacity: usize) -> (mpsc::Sender<Product>, Collector) {
        let (tx, mut rx) = mpsc::channel::<Product>(capacity);
        let (expected, mut hint) = oneshot::channel::<usize>();
        let handle = tokio::spawn(async move {
            let mut products = Vec::new();
            let mut hinted = false;
            loop {
                tokio::select! {
                    biased;
                    total = &mut hint, if !hinted => {
                        hinted = true;
                        if let Ok(total) = total {
                            // A bogus page count must not turn into a huge allocation.
                            let _ = products.try_reserve(total.min(MAX_RESERVE));
                        }
                    }
                    product = rx.recv() => match product {
                        Some(product) => products.push(product),
                        None => break,
                    },
                }
            }
            products
        });
        (
            tx,
            Collector {
                handle,
                expected: Some(expected),
            },
        )
    }

    /// Size hint for the whole run, once the page count is known. Only the
    /// first call counts.
    pub fn expect(&mut self, total: usize) {
        if let Some(expected) = self.expected.take() {
            let _ = expected.send(total);
        }
    }

    /// Close the channel by dropping the last sender, then wait for the
    /// drain task to hand back everything it received.
    pub async fn finish(mut self, tx: mpsc::Sender<Product>) -> Result<Vec<Product>> {
        drop(tx);
        self.expected.take();
        let products = self
            .handle
            .await
            .map_err(|e| Error::Collector(e.to_string()))?;
        debug!(count = products.len(), "collector drained");
        Ok(products)
    }
}

/// Push one product, suspending while the channel is full.
pub async fn emit(tx: &mpsc::Sender<Product>, product: Product) -> Result<()> {
    tx.send(product)
        .await
        .map_err(|e| Error::Collector(format!("drain task gone, dropped {:?}", e.0.name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str) -> Product {
        Product {
            name: name.into(),
            protein: 0.0,
            fat: 0.0,
            carbohydrate: 0.0,
            kcal: 0,
        }
    }

    #[tokio::test]
    async fn preserves_order_past_capacity() {
        let (tx, collector) = Collector::spawn(2);
        for i in 0..50 {
            emit(&tx, product(&format!("p{}", i))).await.unwrap();
        }
        let got = collector.finish(tx).await.unwrap();
        let names: Vec<String> = got.into_iter().map(|p| p.name).collect();
        let want: Vec<String> = (0..50).map(|i| format!("p{}", i)).collect();
        assert_eq!(names, want);
    }

    #[tokio::test]
    async fn oversized_hint_is_capped() {
        let (tx, mut collector) = Collector::spawn(2);
        collector.expect(usize::MAX);
        emit(&tx, product("a")).await.unwrap();
        let got = collector.finish(tx).await.unwrap();
        assert_eq!(got.len(), 1);
        assert!(got.capacity() <= MAX_RESERVE, "capacity {}", got.capacity());
    }

    #[tokio::test]
    async fn empty_run_yields_empty_vec() {
        let (tx, collector) = Collector::spawn(4);
        assert!(collector.finish(tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reserves_expected_total() {
        let (tx, mut collector) = Collector::spawn(2);
        collector.expect(40);
        collector.expect(1);
        for i in 0..3 {
            emit(&tx, product(&format!("p{}", i))).await.unwrap();
        }
        let got = collector.finish(tx).await.unwrap();
        assert_eq!(got.len(), 3);
        assert!(got.capacity() >= 40, "capacity {}", got.capacity());
    }

    // Current-thread runtime: the drain task cannot run until we yield, so the
    // second product has nowhere to go.
    #[tokio::test]
    async fn full_channel_applies_backpressure() {
        let (tx, collector) = Collector::spawn(1);
        emit(&tx, product("a")).await.unwrap();
        assert!(matches!(
            tx.try_send(product("b")),
            Err(mpsc::error::TrySendError::Full(_))
        ));

        emit(&tx, product("b")).await.unwrap();
        let names: Vec<String> = collector.finish(tx).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
