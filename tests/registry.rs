use anyhow::anyhow;
use lazymod::*;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, PartialEq)]
struct Page(&'static str);

impl Component for Page {
    type Props = ();
    type Output = String;

    fn render(&self, _: ()) -> String {
        format!("<main>{}</main>", self.0)
    }
}

#[derive(IntoLoader)]
struct Home;

#[async_trait]
impl Resolver for Home {
    type Output = Page;

    async fn resolve(&self) -> Result<Page> {
        Ok(Page("home"))
    }
}

#[derive(IntoLoader)]
#[module_key("Page1")]
struct FirstPage {
    failures_left: AtomicUsize,
}

#[async_trait]
impl Resolver for FirstPage {
    type Output = Page;

    async fn resolve(&self) -> Result<Page> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("offline"));
        }
        Ok(Page("page1"))
    }
}

fn page(name: &'static str) -> impl Resolver<Output = Page> {
    resolver_fn(move || async move { Ok::<_, anyhow::Error>(Page(name)) })
}

#[test]
fn derived_key_defaults_to_type_name() {
    assert_eq!(Home.module_key(), ModuleKey::from("Home"));

    let first = FirstPage {
        failures_left: AtomicUsize::new(0),
    };
    assert_eq!(first.module_key(), ModuleKey::from("Page1"));
    assert_eq!(first.into_loader().key(), &ModuleKey::from("Page1"));
}

#[tokio::test]
async fn register_then_get_returns_the_same_loader() {
    let registry = Registry::create();
    let registered = registry.register("Page2", page("page2")).unwrap();

    let fetched = registry.get::<Page>(&"Page2".into()).unwrap();

    assert!(Arc::ptr_eq(&registered, &fetched));
    assert_eq!(*fetched.resolve().await, Page("page2"));
    assert!(registered.is_resolved());
}

#[tokio::test]
async fn a_key_keeps_its_first_resolver() {
    let registry = Registry::create();
    let first = registry.register("Page2", page("first")).unwrap();
    let second = registry.register("Page2", page("second")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*second.resolve().await, Page("first"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn unknown_key_is_reported() {
    let registry = Registry::create();

    match registry.get::<Page>(&"Missing".into()) {
        Err(LoadError::UnknownModule(key)) => assert_eq!(key.as_str(), "Missing"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    assert!(!registry.contains(&"Missing".into()));
}

#[test]
fn unit_type_must_match() {
    let registry = Registry::create();
    registry.register("Home", page("home")).unwrap();

    assert!(matches!(
        registry.get::<String>(&"Home".into()),
        Err(LoadError::TypeMismatch { .. })
    ));
    assert!(matches!(
        registry.register("Home", resolver_fn(|| async { Ok::<_, anyhow::Error>(String::from("home")) })),
        Err(LoadError::TypeMismatch { .. })
    ));
}

#[test]
fn keys_are_listed_sorted() {
    let registry = Registry::create();
    registry.register("Page2", page("page2")).unwrap();
    registry.register_module(Home).unwrap();
    registry.register("MainLayout", page("layout")).unwrap();

    assert_eq!(
        registry.keys(),
        vec![
            ModuleKey::from("Home"),
            ModuleKey::from("MainLayout"),
            ModuleKey::from("Page2")
        ]
    );
    assert!(!registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn preload_resolves_what_the_server_pass_used() {
    let delay = Duration::from_millis(500);

    // Server side: every unit is at hand, rendering records what was used.
    let server = Registry::create();
    let home = server.register_module(Home).unwrap();
    let page2 = server.register("Page2", page("page2")).unwrap();
    server.preload(&server.keys()).await.unwrap();

    let mut ledger = UsageLedger::new();
    let markup: Vec<String> = [&home, &page2]
        .iter()
        .map(|loader| EagerView::from_loader(loader).unwrap())
        .map(|view| view.render((), Some(&mut ledger)))
        .collect();
    assert_eq!(markup, vec!["<main>home</main>", "<main>page2</main>"]);

    // Client side: units arrive lazily, one of them flaky.
    let client = Registry::with_config(LoaderConfig::default().with_retry_delay(delay));
    let client_home = client.register_module(Home).unwrap();
    let client_page1 = client
        .register_module(FirstPage {
            failures_left: AtomicUsize::new(2),
        })
        .unwrap();
    let client_page2 = client.register("Page2", page("page2")).unwrap();

    client.preload(&ledger.distinct()).await.unwrap();

    assert!(client_home.is_resolved());
    assert!(client_page2.is_resolved());
    assert!(!client_page1.is_resolved());

    let view = AsyncView::new(client_page2);
    assert_eq!(view.render(()), Some("<main>page2</main>".to_owned()));

    client.preload(&[ModuleKey::from("Page1")]).await.unwrap();
    assert_eq!(client_page1.failed_attempts(), 2);
    assert_eq!(client_page1.config().retry_delay, delay);
}

#[tokio::test]
async fn preload_checks_every_key_first() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let registry = Registry::create();
    registry
        .register(
            "Home",
            resolver_fn(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, anyhow::Error>(Page("home")) }
            }),
        )
        .unwrap();

    let keys = [ModuleKey::from("Home"), ModuleKey::from("Nope")];
    let outcome = registry.preload(&keys).await;

    assert!(matches!(outcome, Err(LoadError::UnknownModule(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
