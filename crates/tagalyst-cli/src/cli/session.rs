//! One offline run of the engine: a fixture page, a JSON store and an
//! activated bootstrap.

use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tagalyst_core::bootstrap::{Activation, Bootstrap};
use tagalyst_core::devtools::ScriptApi;
use tagalyst_core::fixtures::PageFixture;
use tagalyst_core::{CoreConfig, HostPage, JsonFileStorage, NodeId, StorageGateway};

use super::protocol::CliCommand;

pub struct Session {
    bootstrap: Bootstrap,
    activation: Option<Activation>,
}

impl Session {
    /// Open the store and build the page. `fixture` may be omitted for
    /// commands that only touch settings.
    pub fn open(fixture: Option<&Path>, store: &Path) -> Result<Self> {
        let page = match fixture {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
                let fixture = PageFixture::from_json(&text)
                    .with_context(|| format!("Failed to parse fixture: {}", path.display()))?;
                fixture
                    .build()
                    .with_context(|| format!("Failed to build page from {}", path.display()))?
            }
            None => HostPage::new("about:blank"),
        };
        let storage = JsonFileStorage::open(store);
        if let Some(e) = storage.take_load_error() {
            tracing::warn!("Store {} could not be loaded, starting empty: {}", store.display(), e);
        }
        let storage: Rc<dyn StorageGateway> = Rc::new(storage);
        let bootstrap = Bootstrap::new(Rc::new(page), storage, CoreConfig::immediate());
        Ok(Self {
            bootstrap,
            activation: None,
        })
    }

    pub fn bootstrap(&self) -> &Bootstrap {
        &self.bootstrap
    }

    /// Result of the last activation, if a thread command ran
    pub fn activation(&self) -> Option<&Activation> {
        self.activation.as_ref()
    }

    async fn activate(&mut self) -> Result<()> {
        let activation = self.bootstrap.activate().await;
        tracing::debug!("Activation: {:?}", activation);
        if !activation.is_active() {
            bail!("Page is not an active thread: {:?}", activation);
        }
        self.activation = Some(activation);
        Ok(())
    }

    fn message_at(&self, index: usize) -> Result<NodeId> {
        let context = self
            .bootstrap
            .service()
            .context()
            .ok_or_else(|| anyhow!("No active thread"))?;
        let doc = self.bootstrap.page().document();
        let messages = context.adapter.messages(&doc, context.container);
        messages
            .get(index)
            .map(|m| m.element)
            .ok_or_else(|| anyhow!("No message at index {} ({} messages)", index, messages.len()))
    }

    /// Run one command and return its JSON result.
    pub async fn execute(&mut self, command: CliCommand) -> Result<Value> {
        if !matches!(command, CliCommand::Config { .. }) {
            self.activate().await?;
        }
        let service = Rc::clone(self.bootstrap.service());

        match command {
            CliCommand::Pairs => {
                let context = service.context().ok_or_else(|| anyhow!("No active thread"))?;
                let api = ScriptApi::with_adapter(Rc::clone(self.bootstrap.page()), context.adapter);
                Ok(serde_json::to_value(api.get_thread_pairs())?)
            }
            CliCommand::Render => {
                let summary = service.last_summary().ok_or_else(|| anyhow!("Nothing rendered"))?;
                Ok(serde_json::to_value(summary)?)
            }
            CliCommand::Matches { tags, search } => {
                for tag in &tags {
                    service.focus().borrow_mut().toggle_tag(tag);
                }
                if let Some(query) = &search {
                    service.focus().borrow_mut().set_search_query(query);
                }
                let summary = service
                    .render_now()
                    .await
                    .ok_or_else(|| anyhow!("Nothing rendered"))?;
                Ok(json!({
                    "mode": summary.mode,
                    "matches": summary.matches,
                    "searchCount": summary.search_count,
                }))
            }
            CliCommand::Star { index } => {
                let element = self.message_at(index)?;
                let starred = service
                    .toggle_star(element)
                    .await
                    .ok_or_else(|| anyhow!("Failed to update message {}", index))?;
                Ok(json!({ "index": index, "starred": starred }))
            }
            CliCommand::Tag { index, tags } => {
                let element = self.message_at(index)?;
                let value = service
                    .set_tags(element, &tags)
                    .await
                    .ok_or_else(|| anyhow!("Failed to update message {}", index))?;
                Ok(value.to_json())
            }
            CliCommand::Note { index, note } => {
                let element = self.message_at(index)?;
                let value = service
                    .set_note(element, &note)
                    .await
                    .ok_or_else(|| anyhow!("Failed to update message {}", index))?;
                Ok(value.to_json())
            }
            CliCommand::Name { name } => {
                let meta = service
                    .set_thread_name(&name)
                    .await
                    .ok_or_else(|| anyhow!("Failed to update thread"))?;
                Ok(meta.to_json())
            }
            CliCommand::Config { flag } => self.config(flag.as_ref()).await,
        }
    }

    async fn config(&self, flag: Option<&(String, bool)>) -> Result<Value> {
        let service = self.bootstrap.config();
        service.load().await?;
        if let Some((name, enabled)) = flag {
            service.set_flag(name, *enabled).await?;
        }
        Ok(service.current().to_json())
    }
}
