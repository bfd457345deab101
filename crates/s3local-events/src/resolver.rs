//! Function name → handler resolution

use s3local_core::config::DispatchConfig;
use s3local_core::types::ServiceDefinition;
use std::collections::HashMap;
use tracing::debug;

use crate::invoke::{HandlerRef, HandlerTarget};

/// Resolves the function named by a declaration to an invocable handler
pub trait HandlerResolver: Send + Sync {
    fn resolve(&self, function: &str) -> Option<HandlerRef>;
}

impl HandlerResolver for HashMap<String, HandlerRef> {
    fn resolve(&self, function: &str) -> Option<HandlerRef> {
        self.get(function).cloned()
    }
}

/// Handlers of the functions declared by a service
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    handlers: HashMap<String, HandlerRef>,
}

impl FunctionTable {
    /// A function is invocable when it has a handler and either a local
    /// command or a configured invoke endpoint.
    pub fn from_service(service: &ServiceDefinition, dispatch: &DispatchConfig) -> Self {
        let mut handlers = HashMap::new();

        for function in &service.functions {
            let Some(handler) = function.handler.clone() else {
                debug!("Function {} has no handler", function.name);
                continue;
            };

            let target = match (&function.command, &dispatch.invoke_endpoint) {
                (Some(command), _) if !command.is_empty() => HandlerTarget::Command {
                    program: command[0].clone(),
                    args: command[1..].to_vec(),
                },
                (_, Some(endpoint)) => HandlerTarget::Lambda {
                    url: invocation_url(endpoint, function.deployed_name()),
                },
                _ => {
                    debug!(
                        "Function {} has neither a command nor an invoke endpoint",
                        function.name
                    );
                    continue;
                }
            };

            handlers.insert(
                function.name.clone(),
                HandlerRef {
                    function: function.name.clone(),
                    handler,
                    target,
                },
            );
        }

        Self { handlers }
    }

    pub fn get(&self, function: &str) -> Option<&HandlerRef> {
        self.handlers.get(function)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerResolver for FunctionTable {
    fn resolve(&self, function: &str) -> Option<HandlerRef> {
        self.get(function).cloned()
    }
}

/// Lambda `Invoke` API path for a function
fn invocation_url(endpoint: &str, function_name: &str) -> String {
    format!(
        "{}/2015-03-31/functions/{}/invocations",
        endpoint.trim_end_matches('/'),
        urlencoding::encode(function_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = r#"
[[functions]]
name = "s3hook"
handler = "handler.s3hook"
function_name = "svc-dev-s3hook"

[[functions]]
name = "resize"
handler = "resize.main"
command = ["python3", "resize.py", "--fast"]

[[functions]]
name = "nohandler"
"#;

    fn service() -> ServiceDefinition {
        toml::from_str(SERVICE).unwrap()
    }

    #[test]
    fn test_lambda_and_command_targets() {
        let dispatch = DispatchConfig {
            invoke_endpoint: Some("http://localhost:3002/".to_string()),
            ..Default::default()
        };
        let table = FunctionTable::from_service(&service(), &dispatch);
        assert_eq!(table.len(), 2);

        let s3hook = table.resolve("s3hook").unwrap();
        assert_eq!(s3hook.handler, "handler.s3hook");
        assert_eq!(
            s3hook.target,
            HandlerTarget::Lambda {
                url: "http://localhost:3002/2015-03-31/functions/svc-dev-s3hook/invocations"
                    .to_string()
            }
        );

        let resize = table.resolve("resize").unwrap();
        assert_eq!(
            resize.target,
            HandlerTarget::Command {
                program: "python3".to_string(),
                args: vec!["resize.py".to_string(), "--fast".to_string()],
            }
        );

        assert!(table.resolve("nohandler").is_none());
        assert!(table.resolve("unknown").is_none());
    }

    #[test]
    fn test_without_endpoint_only_commands_resolve() {
        let table = FunctionTable::from_service(&service(), &DispatchConfig::default());
        assert!(table.resolve("s3hook").is_none());
        assert!(table.resolve("resize").is_some());
    }

    #[test]
    fn test_map_resolver() {
        let mut map = HashMap::new();
        map.insert(
            "f".to_string(),
            HandlerRef::command("f", "h", "true", Vec::new()),
        );
        assert_eq!(map.resolve("f").unwrap().function, "f");
        assert!(map.resolve("g").is_none());
    }
}
