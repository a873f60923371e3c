//! Traversal engine.
//!
//! A run starts from the endpoint classes and walks the graph depth-first.
//! Each node goes through `Discovered -> Resolved -> Scanned -> ChildrenProcessed -> Exited`:
//!
//! - resolve hooks run on the draft, before the node is created
//! - enter and scan hooks run on the new node
//! - root-level dependencies are queued (and referenced by name when requested)
//! - children are built recursively and attached once they exit
//! - exit hooks run, the node becomes immutable
//!
//! Root-level entities are processed from a queue, so recursion depth follows
//! nesting depth and never the number of reachable types. The visited set
//! alone terminates cycles: an entity already visited is only referenced.

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{NodeDraft, NodeId, NodePath, NodeState, SourceEntity, TargetFragment};
use crate::openapi::OpenApiDocument;
use crate::plugin::{self, Dependencies, Plugin, PluginContext, PluginRegistry, RootDependency};
use crate::storage::SharedStorage;
use crate::type_model::{MetadataProvider, TypeModel};
use log::{debug, info};
use std::collections::VecDeque;

/// Generates documents from class metadata with an ordered set of plugins.
///
/// A parser holds no run state: independent runs may share one parser across threads.
pub struct Parser {
    config: ParserConfig,
    plugins: PluginRegistry,
}

/// The result of a run: the document plus the node graph it was built from
pub struct ParseOutcome {
    pub document: OpenApiDocument,
    pub graph: Graph,
}

impl Parser {
    /// Create a parser with explicit plugin instances
    pub fn new(config: ParserConfig, plugins: Vec<Box<dyn Plugin>>) -> Result<Self> {
        let plugins = PluginRegistry::new(plugins)?;
        info!("Plugins: {}", plugins.names().join(", "));
        Ok(Self { config, plugins })
    }

    /// Create a parser running the built-in plugins listed in the configuration
    pub fn from_config(config: ParserConfig) -> Result<Self> {
        let plugins = config
            .plugins
            .iter()
            .map(plugin::instantiate)
            .collect::<Result<Vec<_>>>()?;
        Self::new(config, plugins)
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Generate the document for the configured roots, or for every annotated
    /// endpoint class when no roots are configured
    pub fn parse(&self, provider: &dyn MetadataProvider) -> Result<OpenApiDocument> {
        Ok(self.run(provider)?.document)
    }

    pub fn run(&self, provider: &dyn MetadataProvider) -> Result<ParseOutcome> {
        let types = TypeModel::new(provider);
        let roots: Vec<String> = if self.config.roots.is_empty() {
            types
                .endpoint_classes(&self.config.endpoint_annotations)
                .into_iter()
                .map(|class| class.name.clone())
                .collect()
        } else {
            self.config.roots.clone()
        };
        self.parse_roots(provider, &roots)
    }

    /// Generate the document for explicit endpoint classes
    pub fn parse_roots(&self, provider: &dyn MetadataProvider, roots: &[String]) -> Result<ParseOutcome> {
        let types = TypeModel::new(provider);
        info!("Generating document for {} endpoint(s)", roots.len());

        let mut run = Run {
            types,
            config: &self.config,
            plugins: &self.plugins,
            graph: Graph::new(),
            storage: SharedStorage::new(OpenApiDocument::new(self.config.info.clone())),
            queue: VecDeque::new(),
        };

        for root in roots {
            types.require_class(root)?;
            let draft = run.resolve(
                NodeDraft::new(SourceEntity::Endpoint { class: root.clone() }),
                &NodePath::root(),
            )?;
            if run.storage.mark_visited(&draft.identity()) {
                run.queue.push_back(draft);
            }
        }

        while let Some(draft) = run.queue.pop_front() {
            let id = run.build(draft, &NodePath::root())?;
            run.attach_root(id)?;
        }

        info!(
            "Processed {} nodes into {} paths and {} schemas",
            run.graph.len(),
            run.storage.document().paths.len(),
            run.storage.document().components.schemas.len()
        );

        Ok(ParseOutcome {
            document: run.storage.finish(),
            graph: run.graph,
        })
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Enter,
    Exit,
}

/// The state of one generation run
struct Run<'a> {
    types: TypeModel<'a>,
    config: &'a ParserConfig,
    plugins: &'a PluginRegistry,
    graph: Graph,
    storage: SharedStorage,
    queue: VecDeque<NodeDraft>,
}

impl Run<'_> {
    fn context(&mut self) -> PluginContext<'_> {
        PluginContext {
            types: self.types,
            graph: &mut self.graph,
            storage: &mut self.storage,
            config: self.config,
        }
    }

    /// Let every plugin, in order, replace the draft
    fn resolve(&mut self, mut draft: NodeDraft, path: &NodePath) -> Result<NodeDraft> {
        let plugins = self.plugins;
        for plugin in plugins.iter() {
            let identity = draft.identity();
            draft = plugin
                .resolve(draft, path, &mut self.context())
                .map_err(|e| e.in_plugin(plugin.name(), "resolving", &identity))?;
        }
        Ok(draft)
    }

    fn hooks(&mut self, phase: Phase, path: &NodePath, id: NodeId) -> Result<()> {
        let plugins = self.plugins;
        for plugin in plugins.iter() {
            let result = match phase {
                Phase::Enter => plugin.enter(path, &mut self.context()),
                Phase::Exit => plugin.exit(path, &mut self.context()),
            };
            result.map_err(|e| {
                let phase = match phase {
                    Phase::Enter => "entering",
                    Phase::Exit => "exiting",
                };
                e.in_plugin(plugin.name(), phase, &self.graph.node(id).identity)
            })?;
        }
        Ok(())
    }

    fn scan(&mut self, path: &NodePath, id: NodeId) -> Result<Dependencies> {
        let plugins = self.plugins;
        let mut deps = Dependencies::new();
        for plugin in plugins.iter() {
            let result = plugin.scan(path, &mut deps, &mut self.context());
            result.map_err(|e| e.in_plugin(plugin.name(), "scanning", &self.graph.node(id).identity))?;
        }
        Ok(deps)
    }

    /// Build a node and everything nested in it; returns once the node has exited
    fn build(&mut self, draft: NodeDraft, parent_path: &NodePath) -> Result<NodeId> {
        let (id, created) = self.graph.create_node(draft, parent_path.current());
        if !created {
            return Ok(id);
        }
        self.graph.set_state(id, NodeState::Resolved);
        let path = parent_path.child(id);
        debug!("Entering {}", self.graph.node(id).identity);

        self.hooks(Phase::Enter, &path, id)?;
        let deps = self.scan(&path, id)?;
        self.graph.set_state(id, NodeState::Scanned);

        let (children, roots) = deps.into_parts();
        for root in roots {
            self.discover(root, &path)?;
        }

        for child in children {
            let draft = self.resolve(NodeDraft::new(child), &path)?;
            if !self.storage.mark_visited(&draft.identity()) {
                debug!("Skipping visited child {}", draft.identity());
                continue;
            }
            let child_id = self.build(draft, &path)?;
            self.graph.attach_child(id, child_id)?;
        }
        self.graph.set_state(id, NodeState::ChildrenProcessed);

        self.hooks(Phase::Exit, &path, id)?;
        self.graph.set_state(id, NodeState::Exited);
        debug!("Exited {}", self.graph.node(id).identity);
        Ok(id)
    }

    /// Resolve a root-level dependency, reference it if requested, and queue it
    /// unless it was visited before
    fn discover(&mut self, root: RootDependency, path: &NodePath) -> Result<()> {
        let draft = self.resolve(NodeDraft::new(root.source), path)?;
        let identity = draft.identity();

        if root.reference {
            let class = draft.source.class_name().and_then(|name| self.types.class(name));
            if let Some(class) = class.filter(|c| c.anonymous) {
                return Err(Error::CycleViolation(class.name.clone()));
            }
            let component = draft.source.component_name().ok_or_else(|| {
                Error::Configuration(format!("`{}` has no component schema to reference", identity))
            })?;
            if let Some(current) = path.current() {
                self.graph.attach_reference(current, &component)?;
            }
        }

        if self.storage.mark_visited(&identity) {
            debug!("Queueing {}", identity);
            self.queue.push_back(draft);
        }
        Ok(())
    }

    /// Put a finished root into the document
    fn attach_root(&mut self, id: NodeId) -> Result<()> {
        let node = self.graph.node(id);
        let document = self.storage.document_mut();
        match node.target() {
            TargetFragment::Endpoint(endpoint) => {
                document.add_endpoint(&endpoint.name, &endpoint.class_name, &endpoint.operations);
            }
            TargetFragment::Schema(schema) => {
                let component = node.source.component_name().ok_or_else(|| {
                    Error::Configuration(format!("root `{}` has no component name", node.identity))
                })?;
                document.add_schema(&component, schema.clone());
            }
            _ => {
                return Err(Error::Configuration(format!(
                    "`{}` cannot be a root of the document",
                    node.identity
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_model::ClassRegistry;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        order: i32,
        requires: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn required_plugins(&self) -> Vec<&'static str> {
            self.requires.clone()
        }

        fn enter(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
            let node = ctx.current(path)?;
            self.log
                .lock()
                .unwrap()
                .push(format!("{} enter {}", self.name, node.source.kind()));
            Ok(())
        }

        fn exit(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
            let node = ctx.current(path)?;
            assert_eq!(node.state, NodeState::ChildrenProcessed);
            self.log
                .lock()
                .unwrap()
                .push(format!("{} exit {}", self.name, node.source.kind()));
            Ok(())
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn scan(&self, _path: &NodePath, _deps: &mut Dependencies, _ctx: &mut PluginContext) -> Result<()> {
            Err(Error::UnknownType("com.example.Missing".to_string()))
        }
    }

    fn registry() -> ClassRegistry {
        ClassRegistry::from_yaml(
            r#"
classes:
  - name: com.example.PingEndpoint
    annotations: [{ name: Endpoint }]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_hooks_run_in_registry_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = |name, order, requires: &[&'static str]| -> Box<dyn Plugin> {
            Box::new(Recorder {
                name,
                order,
                requires: requires.to_vec(),
                log: log.clone(),
            })
        };
        let parser = Parser::new(
            ParserConfig::default(),
            vec![recorder("second", -10, &["first"]), recorder("first", 10, &[])],
        )
        .unwrap();

        parser.parse(&registry()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first enter endpoint".to_string(),
                "second enter endpoint".to_string(),
                "first exit endpoint".to_string(),
                "second exit endpoint".to_string(),
            ]
        );
    }

    #[test]
    fn test_plugin_errors_name_plugin_and_node() {
        let parser = Parser::new(ParserConfig::default(), vec![Box::new(Failing)]).unwrap();
        let err = match parser.parse(&registry()) {
            Err(err) => err,
            Ok(_) => panic!("expected the run to fail"),
        };

        match &err {
            Error::Resolution { plugin, phase, entity, .. } => {
                assert_eq!(plugin, "failing");
                assert_eq!(*phase, "scanning");
                assert_eq!(entity, "endpoint:com.example.PingEndpoint");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root_cause(), Error::UnknownType(_)));
    }

    #[test]
    fn test_unknown_root_is_rejected() {
        let parser = Parser::from_config(ParserConfig::default()).unwrap();
        let result = parser.parse_roots(&registry(), &["com.example.Missing".to_string()]);
        assert!(matches!(result, Err(Error::UnknownType(_))));
    }

    #[test]
    fn test_parser_is_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Parser>();
    }
}
