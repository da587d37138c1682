use std::{future::Future, time::Duration};

use anyhow::{anyhow, Context, Result};
use firewall_common::COUNTER_KEY;
use log::debug;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::kernel::CounterMap;

/// What the polling loop saw before it stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub ticks: u64,
    pub last: Option<u64>,
}

/// Read the packet counter once per `period` and hand each value to `report`
/// until `cancel` resolves.
///
/// The first read happens one full period after the call. Cancellation and
/// the timer race on equal terms; once cancellation wins, no further read is
/// made. A failed lookup ends the loop with an error.
pub async fn run<M, C, F>(map: &M, period: Duration, cancel: C, mut report: F) -> Result<Summary>
where
    M: CounterMap + ?Sized,
    C: Future<Output = ()>,
    F: FnMut(u64),
{
    let start = Instant::now()
        .checked_add(period)
        .ok_or_else(|| anyhow!("poll interval {:?} is out of range", period))?;
    let mut tick = time::interval_at(start, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(cancel);

    let mut summary = Summary::default();
    loop {
        tokio::select! {
            _ = &mut cancel => {
                debug!("polling stopped after {} ticks", summary.ticks);
                return Ok(summary);
            }
            _ = tick.tick() => {
                let count = map.lookup(COUNTER_KEY).context("Map lookup")?;
                summary.ticks += 1;
                summary.last = Some(count);
                report(count);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, time::Duration};

    use anyhow::{anyhow, Result};
    use tokio::{sync::oneshot, time};

    use super::{run, Summary};
    use crate::kernel::CounterMap;

    /// Replays a fixed series of counter values, one per lookup.
    struct Series {
        values: Vec<u64>,
        reads: Cell<usize>,
    }

    impl Series {
        fn new(values: &[u64]) -> Self {
            Self {
                values: values.to_vec(),
                reads: Cell::new(0),
            }
        }
    }

    impl CounterMap for Series {
        fn lookup(&self, key: u32) -> Result<u64> {
            assert_eq!(key, 0);
            let n = self.reads.get();
            self.reads.set(n + 1);
            self.values
                .get(n)
                .copied()
                .ok_or_else(|| anyhow!("no such key"))
        }
    }

    fn cancel_after(after: Duration) -> impl std::future::Future<Output = ()> {
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            time::sleep(after).await;
            let _ = tx.send(());
        });
        async move {
            let _ = rx.await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_report_per_tick() {
        let map = Series::new(&[0, 3, 3, 7]);
        let mut seen = Vec::new();

        let summary = run(
            &map,
            Duration::from_secs(1),
            cancel_after(Duration::from_millis(4500)),
            |count| seen.push(count),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![0, 3, 3, 7]);
        assert_eq!(
            summary,
            Summary {
                ticks: 4,
                last: Some(7)
            }
        );
        assert_eq!(map.reads.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_follow_counter() {
        let values: Vec<u64> = (0..10).map(|n| n * n).collect();
        let map = Series::new(&values);
        let mut seen = Vec::new();

        run(
            &map,
            Duration::from_millis(250),
            cancel_after(Duration::from_millis(2600)),
            |count| seen.push(count),
        )
        .await
        .unwrap();

        assert_eq!(seen, values);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let map = Series::new(&[1]);
        let start = time::Instant::now();

        let summary = run(&map, Duration::from_secs(1), async {}, |_| {
            panic!("reported after cancellation")
        })
        .await
        .unwrap();

        assert_eq!(summary, Summary::default());
        assert_eq!(map.reads.get(), 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_within_one_interval() {
        let map = Series::new(&[5; 8]);
        let start = time::Instant::now();

        let summary = run(
            &map,
            Duration::from_secs(1),
            cancel_after(Duration::from_millis(2100)),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(summary.ticks, 2);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_period_is_error() {
        let map = Series::new(&[1]);
        let period = Duration::from_secs(u64::MAX / 2);

        let err = run(&map, period, cancel_after(Duration::from_secs(1)), |_| {})
            .await
            .unwrap_err();

        assert!(format!("{}", err).contains("out of range"));
        assert_eq!(map.reads.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_is_fatal() {
        let map = Series::new(&[1, 2]);
        let mut seen = Vec::new();

        let err = run(
            &map,
            Duration::from_secs(1),
            cancel_after(Duration::from_secs(60)),
            |count| seen.push(count),
        )
        .await
        .unwrap_err();

        assert_eq!(seen, vec![1, 2]);
        assert!(format!("{:#}", err).contains("Map lookup"));
    }
}
