use lazymod::*;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::runtime::Runtime;

struct Page {
    title: &'static str,
}

impl Component for Page {
    type Props = String;
    type Output = String;

    fn render(&self, url: String) -> String {
        format!("<section data-url=\"{}\">{}</section>", url, self.title)
    }
}

#[derive(IntoLoader)]
struct Home;

#[async_trait]
impl Resolver for Home {
    type Output = Page;

    async fn resolve(&self) -> Result<Page> {
        Ok(Page { title: "Home" })
    }
}

/// Pretends to be offline for the first couple of requests.
#[derive(IntoLoader)]
#[module_key("Page1")]
struct FlakyPage1 {
    offline_for: AtomicUsize,
}

#[async_trait]
impl Resolver for FlakyPage1 {
    type Output = Page;

    async fn resolve(&self) -> Result<Page> {
        if self.offline_for.load(Ordering::SeqCst) > 0 {
            self.offline_for.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("chunk request failed"));
        }
        Ok(Page { title: "Page 1" })
    }
}

fn register_pages(registry: &LoaderContext, offline_for: usize) -> Result<()> {
    registry.register_module(Home)?;
    registry.register_module(FlakyPage1 {
        offline_for: AtomicUsize::new(offline_for),
    })?;
    registry.register(
        "Page2",
        resolver_fn(|| async { Ok::<_, anyhow::Error>(Page { title: "Page 2" }) }),
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let runtime = Runtime::new()?;

    // Server pass: resolve everything, render the requested route, note what was used.
    let server = Registry::create();
    register_pages(&server, 0)?;
    runtime.block_on(server.preload(&server.keys()))?;

    let mut ledger = UsageLedger::new();
    for key in &["Home", "Page1"] {
        let loader = server.get::<Page>(&ModuleKey::from_static(*key))?;
        let view = EagerView::from_loader(&loader)
            .ok_or_else(|| anyhow!("{} was preloaded but is not resolved", key))?;
        println!("{}", view.render("/page1".to_owned(), Some(&mut ledger)));
    }
    dbg!(ledger.distinct());

    // Client start-up: resolve the units the server used, then render.
    let client = Registry::with_config(
        LoaderConfig::default().with_retry_delay(Duration::from_millis(200)),
    );
    register_pages(&client, 2)?;
    runtime.block_on(client.preload(&ledger.distinct()))?;

    for key in ledger.distinct() {
        let view = AsyncView::new(client.get::<Page>(&key)?);
        dbg!(view.render("/page1".to_owned()));
    }

    // Navigating to a unit nobody preloaded shows the placeholder first.
    let mut page2 = AsyncView::new(client.get::<Page>(&"Page2".into())?);
    dbg!(page2.render("/page2".to_owned()));
    runtime.block_on(async {
        page2.mount();
        page2.settled().await;
    });
    dbg!(page2.render("/page2".to_owned()));

    let page1 = client.get::<Page>(&"Page1".into())?;
    dbg!(page1.failed_attempts());

    Ok(())
}
