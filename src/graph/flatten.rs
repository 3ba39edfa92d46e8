use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::warn;

use crate::error::{SetupError, SetupErrors};
use crate::model::{Component, Connection, Interface, Node, Role, VarMeta};
use crate::model::variable::check_name;
use crate::registry::{CompId, Feed, NameEntry, Registry, Slot, SlotId, VarId, Variable};

/// A component with its declared interface and resolved slot handles.
pub(crate) struct CompEntry {
    pub path: String,
    pub component: Box<dyn Component>,
    pub interface: Interface,
    pub params: Vec<SlotId>,
    pub outputs: Vec<SlotId>,
}

/// The group tree flattened into one registry and a component list.
pub(crate) struct Model {
    pub registry: Registry,
    pub components: Vec<CompEntry>,
}

/// Names visible at one scope, each mapped to the variables it covers.
type Namespace = IndexMap<String, Vec<VarId>>;

struct NameDef {
    vars: Vec<VarId>,
    /// (scope, exposed name) for promoted names
    promoted: Option<(String, String)>,
}

struct PendingComp {
    path: String,
    component: Box<dyn Component>,
    interface: Interface,
    vars: Vec<VarId>,
}

#[derive(Default)]
struct Builder {
    vars: Vec<(String, VarMeta, CompId)>,
    comps: Vec<PendingComp>,
    parent: Vec<usize>,
    names: IndexMap<String, NameDef>,
    connections: Vec<(String, Connection)>,
    errors: Vec<SetupError>,
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn scope_label(scope: &str) -> String {
    if scope.is_empty() {
        "<root>".to_string()
    } else {
        scope.to_string()
    }
}

impl Builder {
    fn find(&mut self, mut v: usize) -> usize {
        while self.parent[v] != v {
            self.parent[v] = self.parent[self.parent[v]];
            v = self.parent[v];
        }
        v
    }

    fn union(&mut self, a: VarId, b: VarId) {
        let (ra, rb) = (self.find(a.0), self.find(b.0));
        // the lower index stays root so slots come out in declaration order
        if ra < rb {
            self.parent[rb] = ra;
        } else if rb < ra {
            self.parent[ra] = rb;
        }
    }

    fn flatten(&mut self, path: &str, node: Node) -> Namespace {
        match node {
            Node::Component(component) => self.flatten_component(path, component),
            Node::Group(group) => {
                let (children, promotions, connections) = group.into_parts();

                let mut child_ns: IndexMap<String, Namespace> = IndexMap::new();
                for (name, child) in children {
                    let ns = self.flatten(&join(path, &name), child);
                    child_ns.insert(name, ns);
                }

                let mut ns = Namespace::new();
                for p in promotions {
                    let Some(cns) = child_ns.get(&p.child) else {
                        self.errors.push(SetupError::UnknownVariable {
                            scope: scope_label(path),
                            path: join(&p.child, p.local.as_deref().unwrap_or("*")),
                        });
                        continue;
                    };
                    match (p.local, p.exposed) {
                        (Some(local), exposed) => {
                            let exposed = exposed.unwrap_or_else(|| local.clone());
                            if let Err(e) = check_name(&exposed) {
                                self.errors.push(e);
                                continue;
                            }
                            match cns.get(&local) {
                                Some(vars) => ns.entry(exposed).or_default().extend(vars),
                                None => self.errors.push(SetupError::UnknownVariable {
                                    scope: scope_label(path),
                                    path: join(&p.child, &local),
                                }),
                            }
                        }
                        (None, _) => {
                            for (name, vars) in cns {
                                ns.entry(name.clone()).or_default().extend(vars);
                            }
                        }
                    }
                }

                for (name, vars) in &ns {
                    for (a, b) in vars.iter().tuple_windows() {
                        self.union(*a, *b);
                    }
                    self.names.insert(
                        join(path, name),
                        NameDef {
                            vars: vars.clone(),
                            promoted: Some((scope_label(path), name.clone())),
                        },
                    );
                }

                self.connections
                    .extend(connections.into_iter().map(|c| (path.to_string(), c)));
                ns
            }
        }
    }

    fn flatten_component(&mut self, path: &str, component: Box<dyn Component>) -> Namespace {
        let comp = CompId(self.comps.len());
        let mut interface = Interface::new(path);
        if let Err(e) = component.declare(&mut interface) {
            self.errors.push(e);
        }

        let mut ns = Namespace::new();
        let mut vars = Vec::new();
        for meta in interface.iter() {
            let id = VarId(self.vars.len());
            let full = join(path, &meta.name);
            self.vars.push((full.clone(), meta.clone(), comp));
            self.parent.push(id.0);
            self.names.insert(
                full,
                NameDef {
                    vars: vec![id],
                    promoted: None,
                },
            );
            ns.insert(meta.name.clone(), vec![id]);
            vars.push(id);
        }

        self.comps.push(PendingComp {
            path: path.to_string(),
            component,
            interface,
            vars,
        });
        ns
    }

    fn finish(mut self) -> Result<Model, SetupErrors> {
        // one slot per alias class, numbered by first member
        let mut slot_of_root: HashMap<usize, SlotId> = HashMap::new();
        let mut members: Vec<Vec<VarId>> = Vec::new();
        let mut var_slot = Vec::with_capacity(self.vars.len());
        for v in 0..self.vars.len() {
            let root = self.find(v);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                members.push(Vec::new());
                SlotId(members.len() - 1)
            });
            members[slot.0].push(VarId(v));
            var_slot.push(slot);
        }

        let vars: Vec<Variable> = self
            .vars
            .into_iter()
            .enumerate()
            .map(|(i, (path, meta, component))| Variable {
                path,
                meta,
                component,
                slot: var_slot[i],
            })
            .collect();

        let mut errors = self.errors;
        let mut slots = Vec::with_capacity(members.len());
        for (s, members) in members.into_iter().enumerate() {
            let outputs: Vec<VarId> = members
                .iter()
                .copied()
                .filter(|v| vars[v.0].meta.role == Role::Output)
                .collect();

            if outputs.len() > 1 {
                let (scope, name) = self
                    .names
                    .values()
                    .filter_map(|d| d.promoted.as_ref().map(|p| (d, p)))
                    .find(|(d, _)| d.vars.iter().any(|v| var_slot[v.0].0 == s))
                    .map(|(_, p)| p.clone())
                    .unwrap_or_default();
                errors.push(SetupError::AmbiguousPromotion {
                    scope,
                    name,
                    outputs: outputs.iter().map(|v| vars[v.0].path.clone()).collect(),
                });
            }

            let (feed, value) = match outputs.first() {
                Some(&out) if vars[out.0].meta.independent => {
                    (Feed::Independent(out), vars[out.0].meta.default)
                }
                Some(&out) => (Feed::Computed(out), vars[out.0].meta.default),
                None => (Feed::External, initial_param_value(&vars, &members)),
            };

            slots.push(Slot {
                members,
                value,
                feed,
                targets: Vec::new(),
            });
        }

        let mut registry = Registry {
            vars,
            slots,
            names: HashMap::new(),
        };
        for (name, def) in &self.names {
            let has_role = |role: Role| def.vars.iter().any(|v| registry.vars[v.0].meta.role == role);
            let (has_param, has_output) = (has_role(Role::Parameter), has_role(Role::Output));
            if let Some(first) = def.vars.first() {
                let slot = registry.vars[first.0].slot;
                registry.names.insert(
                    name.clone(),
                    NameEntry {
                        slot,
                        has_param,
                        has_output,
                    },
                );
            }
        }

        for (scope, connection) in &self.connections {
            if let Err(e) = connect(&mut registry, scope, connection) {
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            return Err(SetupErrors(errors));
        }

        let components = self
            .comps
            .into_iter()
            .map(|c| {
                let slot_of = |v: &VarId| registry.vars[v.0].slot;
                let n_params = c.interface.params().len();
                CompEntry {
                    params: c.vars[..n_params].iter().map(slot_of).collect(),
                    outputs: c.vars[n_params..].iter().map(slot_of).collect(),
                    path: c.path,
                    component: c.component,
                    interface: c.interface,
                }
            })
            .collect();

        Ok(Model {
            registry,
            components,
        })
    }
}

/// First declared default among aliased parameters.
fn initial_param_value(vars: &[Variable], members: &[VarId]) -> Option<f64> {
    let defaults: Vec<(&str, f64)> = members
        .iter()
        .filter_map(|v| vars[v.0].meta.default.map(|d| (vars[v.0].path.as_str(), d)))
        .collect();
    let (first_path, first) = *defaults.first()?;
    for (path, d) in &defaults[1..] {
        if *d != first {
            warn!(
                kept = first_path,
                ignored = path,
                "aliased parameters declare different defaults; keeping the first"
            );
        }
    }
    Some(first)
}

fn connect(registry: &mut Registry, scope: &str, connection: &Connection) -> Result<(), SetupError> {
    let resolve = |path: &str| {
        registry
            .entry(&join(scope, path))
            .ok_or_else(|| SetupError::UnknownVariable {
                scope: scope_label(scope),
                path: path.to_string(),
            })
    };
    let source = resolve(&connection.source)?;
    let target = resolve(&connection.target)?;

    if !source.has_output {
        return Err(SetupError::RoleMismatch {
            path: connection.source.clone(),
            expected: "output",
        });
    }
    if !target.has_param {
        return Err(SetupError::RoleMismatch {
            path: connection.target.clone(),
            expected: "parameter",
        });
    }

    let target_abs = join(scope, &connection.target);
    let existing = match &registry.slots[target.slot.0].feed {
        Feed::External => None,
        Feed::Independent(v) | Feed::Computed(v) => Some(registry.vars[v.0].path.clone()),
        Feed::Connected { source, .. } => Some(source.clone()),
    };
    if let Some(existing) = existing {
        return Err(SetupError::DuplicateConnection {
            target: target_abs,
            existing,
        });
    }

    let source_abs = join(scope, &connection.source);
    let source_unit = unit_of(registry, source.slot);
    let target_unit = unit_of(registry, target.slot);
    if let (Some(su), Some(tu)) = (&source_unit, &target_unit) {
        if su != tu {
            warn!(
                source = %source_abs,
                target = %target_abs,
                source_unit = %su,
                target_unit = %tu,
                "connected variables declare different units; values are passed unconverted"
            );
        }
    }

    registry.slots[target.slot.0].feed = Feed::Connected {
        from: source.slot,
        source: source_abs,
    };
    registry.slots[source.slot.0].targets.push(target.slot);
    Ok(())
}

fn unit_of(registry: &Registry, slot: SlotId) -> Option<String> {
    registry.slots[slot.0]
        .members
        .iter()
        .find_map(|v| registry.vars[v.0].meta.unit.clone())
}

/// Flatten a model tree rooted at `root`.
pub(crate) fn flatten(root: Node) -> Result<Model, SetupErrors> {
    let mut builder = Builder::default();
    builder.flatten("", root);
    builder.finish()
}
