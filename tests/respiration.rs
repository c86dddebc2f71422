mod common;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use objrepo::{CollectionClass, FindOptions, Item, PutOptions, Repository, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Widget {
    id: String,
    n: i64,
    is_new: bool,
}

impl Item for Widget {
    fn class_name(&self) -> &'static str {
        "Widgets"
    }

    fn class_chain(&self) -> &'static [&'static str] {
        &["Widgets"]
    }

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn serialize(&self) -> Value {
        json!({ "n": self.n })
    }

    fn replace_value(&mut self, record: &Value) -> Result<()> {
        self.n = record["n"].as_i64().unwrap_or_default();
        Ok(())
    }

    fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Widgets;

impl CollectionClass for Widgets {
    type Item = Widget;
    const NAME: &'static str = "Widgets";

    fn class_chain() -> &'static [&'static str] {
        &["Widgets"]
    }

    fn from_record(key: &str, record: &Value) -> Result<Widget> {
        Ok(Widget {
            id: key.to_string(),
            n: record["n"].as_i64().unwrap_or_default(),
            is_new: false,
        })
    }
}

/// Spawns a task that spins, incrementing `counter` each time it gets polled.
/// On a single-threaded executor this can only interleave with the test's
/// main future at an explicit yield point, so a nonzero count afterwards is
/// evidence the awaited call actually yielded back to the scheduler rather
/// than running the whole batch in one poll.
fn spawn_spinner(counter: Arc<AtomicUsize>, stop: Arc<std::sync::atomic::AtomicBool>) {
    tokio::spawn(async move {
        while !stop.load(Ordering::SeqCst) {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    });
}

#[tokio::test(flavor = "current_thread")]
async fn get_items_respires_every_250_items() {
    let repo = Repository::builder("respiration-get", "memory://respiration-get")
        .register::<Widgets>()
        .build();
    repo.initialize().await.unwrap();

    let widgets = repo.collection::<Widgets>();
    let mut keys = Vec::new();
    for i in 0..600 {
        let mut w = Widget {
            id: format!("w{i:04}"),
            n: i,
            is_new: true,
        };
        widgets.put_item(&mut w, PutOptions::default()).await.unwrap();
        keys.push(w.id.clone());
    }

    let polls = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    spawn_spinner(polls.clone(), stop.clone());

    let items = widgets.get_items(&keys).await.unwrap();
    stop.store(true, Ordering::SeqCst);

    assert_eq!(items.len(), 600);
    // 600 items at a respiration rate of 250 yields at indices 250 and 500,
    // i.e. at least twice (§8 invariant 10: ⌊600/250⌋ = 2).
    assert!(
        polls.load(Ordering::SeqCst) >= 2,
        "expected the background task to run at least twice, ran {} times",
        polls.load(Ordering::SeqCst)
    );
}

#[tokio::test(flavor = "current_thread")]
async fn find_items_respires_every_250_items() {
    let repo = Repository::builder("respiration-find", "memory://respiration-find")
        .register::<Widgets>()
        .build();
    repo.initialize().await.unwrap();

    let widgets = repo.collection::<Widgets>();
    for i in 0..600 {
        let mut w = Widget {
            id: format!("w{i:04}"),
            n: i,
            is_new: true,
        };
        widgets.put_item(&mut w, PutOptions::default()).await.unwrap();
    }

    let polls = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    spawn_spinner(polls.clone(), stop.clone());

    let items = widgets.find_items(&FindOptions::new()).await.unwrap();
    stop.store(true, Ordering::SeqCst);

    assert_eq!(items.len(), 600);
    assert!(polls.load(Ordering::SeqCst) >= 2);
}
