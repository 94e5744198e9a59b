use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use conduit_trigger::HttpMethod;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::workflow::{Binding, Workflow};

/// Collects workflows during startup.
#[derive(Default)]
pub struct RegistryBuilder {
  workflows: Vec<Workflow>,
}

impl RegistryBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a workflow. A workflow with the same id is replaced in place.
  pub fn register(mut self, workflow: Workflow) -> Self {
    match self.workflows.iter_mut().find(|w| w.id() == workflow.id()) {
      Some(existing) => {
        warn!(workflow_id = %workflow.id(), "workflow_replaced");
        *existing = workflow;
      }
      None => self.workflows.push(workflow),
    }
    self
  }

  /// Freeze the registry.
  ///
  /// Fails when two workflows share a method and path shape, when two watch
  /// workflows share a file, or when a watch workflow declares validation.
  pub fn build(self) -> Result<Registry, RegistryError> {
    let mut routes: HashMap<(HttpMethod, String), &str> = HashMap::new();
    let mut watched: HashMap<PathBuf, &str> = HashMap::new();

    for workflow in &self.workflows {
      match workflow.binding() {
        Binding::Http { trigger, .. } => {
          let key = (trigger.method, trigger.path.shape());
          if let Some(first) = routes.get(&key) {
            return Err(RegistryError::DuplicateRoute {
              method: trigger.method.to_string(),
              shape: key.1,
              first: first.to_string(),
              second: workflow.id().to_string(),
            });
          }
          routes.insert(key, workflow.id());
        }
        Binding::WatchFile { trigger, .. } => {
          if workflow.validation().is_some() {
            return Err(RegistryError::ValidationOnWatch(workflow.id().to_string()));
          }
          if let Some(first) = watched.get(&trigger.file_path) {
            return Err(RegistryError::DuplicateWatch {
              file_path: trigger.file_path.clone(),
              first: first.to_string(),
              second: workflow.id().to_string(),
            });
          }
          watched.insert(trigger.file_path.clone(), workflow.id());
        }
      }
    }

    debug!(
      http = routes.len(),
      watch = watched.len(),
      "registry_built"
    );

    Ok(Registry {
      workflows: self.workflows.into_iter().map(Arc::new).collect(),
    })
  }
}

/// A matched HTTP workflow and the parameters extracted from the path.
#[derive(Debug, Clone)]
pub struct HttpMatch {
  pub workflow: Arc<Workflow>,
  pub params: HashMap<String, String>,
}

/// The frozen set of workflows. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  workflows: Vec<Arc<Workflow>>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
  }

  pub fn get(&self, id: &str) -> Option<&Arc<Workflow>> {
    self.workflows.iter().find(|w| w.id() == id)
  }

  pub fn len(&self) -> usize {
    self.workflows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.workflows.is_empty()
  }

  /// Workflows in registration order.
  pub fn iter(&self) -> impl Iterator<Item = &Arc<Workflow>> {
    self.workflows.iter()
  }

  pub fn watch_workflows(&self) -> impl Iterator<Item = &Arc<Workflow>> {
    self
      .workflows
      .iter()
      .filter(|w| matches!(w.binding(), Binding::WatchFile { .. }))
  }

  /// Find the HTTP workflow for a request.
  ///
  /// The method must match exactly and the template must match `path`
  /// segment for segment. Among several matches the template with static
  /// segments earliest wins.
  pub fn match_http(&self, method: HttpMethod, path: &str) -> Option<HttpMatch> {
    self
      .workflows
      .iter()
      .filter_map(|workflow| match workflow.binding() {
        Binding::Http { trigger, .. } if trigger.method == method => trigger
          .path
          .matches(path)
          .map(|params| (workflow, &trigger.path, params)),
        _ => None,
      })
      .max_by(|(_, a, _), (_, b, _)| a.specificity_cmp(b))
      .map(|(workflow, _, params)| HttpMatch {
        workflow: Arc::clone(workflow),
        params,
      })
  }
}
