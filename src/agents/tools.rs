/// Agent tools - named callables an agent's logic can look up at run time.
use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type ToolFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    func: Arc<ToolFn>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        func: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn execute(&self, args: Value) -> Result<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// First tool whose name matches; later duplicates are shadowed.
pub fn find_tool<'a>(tools: &'a [Tool], name: &str) -> Option<&'a Tool> {
    tools.iter().find(|tool| tool.name == name)
}
