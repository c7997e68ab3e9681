//! Template functions backed by remote lookups.

use std::sync::Arc;
use std::time::Duration;

use serde_yaml::Value;
use stacks_cloud::{retry_blocking, CloudResult, ResourceLookup, RetryPolicy};
use stacks_templates::TemplateRenderer;

/// Blocking sleep used between throttled lookups.
pub type BlockingSleep = Arc<dyn Fn(Duration) + Send + Sync>;

/// Names of the lookup functions templates can call.
pub const LOOKUP_FUNCTIONS: [&str; 6] = [
    "get_ami_id",
    "get_vpc_id",
    "get_zone_id",
    "get_stack_output",
    "get_stack_tag",
    "get_stack_resource",
];

/// Registers lookup functions on a renderer.
#[derive(Clone)]
pub struct LookupFunctions {
    lookup: Arc<dyn ResourceLookup>,
    policy: RetryPolicy,
    sleep: BlockingSleep,
}

impl LookupFunctions {
    pub fn new(lookup: Arc<dyn ResourceLookup>) -> Self {
        Self {
            lookup,
            policy: RetryPolicy::default(),
            sleep: Arc::new(std::thread::sleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleep(mut self, sleep: BlockingSleep) -> Self {
        self.sleep = sleep;
        self
    }

    /// Add every lookup function to `renderer`.
    pub fn register(&self, renderer: &mut TemplateRenderer) {
        self.add(renderer, "get_ami_id", 1, |l, a| l.image_id(&a[0]));
        self.add(renderer, "get_vpc_id", 1, |l, a| l.vpc_id(&a[0]));
        self.add(renderer, "get_zone_id", 1, |l, a| l.zone_id(&a[0]));
        self.add(renderer, "get_stack_output", 2, |l, a| {
            l.stack_output(&a[0], &a[1])
        });
        self.add(renderer, "get_stack_tag", 2, |l, a| l.stack_tag(&a[0], &a[1]));
        self.add(renderer, "get_stack_resource", 2, |l, a| {
            l.stack_resource(&a[0], &a[1])
        });
    }

    fn add<F>(&self, renderer: &mut TemplateRenderer, name: &'static str, arity: usize, call: F)
    where
        F: Fn(&dyn ResourceLookup, &[String]) -> CloudResult<String> + Send + Sync + 'static,
    {
        let lookup = self.lookup.clone();
        let sleep = self.sleep.clone();
        let policy = self.policy;

        renderer.register(
            name,
            Arc::new(move |args: &[Value]| {
                let args = string_args(name, arity, args)?;
                retry_blocking(&policy, &|d: Duration| sleep(d), || call(lookup.as_ref(), &args))
                    .map(Value::String)
                    .map_err(|e| e.to_string())
            }),
        );
    }
}

fn string_args(name: &str, arity: usize, args: &[Value]) -> Result<Vec<String>, String> {
    if args.len() != arity {
        return Err(format!(
            "{} takes {} argument(s), {} given",
            name,
            arity,
            args.len()
        ));
    }
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(format!("{}: unsupported argument {:?}", name, other)),
        })
        .collect()
}
