use indexmap::IndexMap;

use crate::error::SetupError;

use super::component::Component;
use super::variable::check_name;

/// A node of the model tree: either a leaf component or a nested group.
pub enum Node {
    Component(Box<dyn Component>),
    Group(Group),
}

impl Node {
    pub fn component(component: impl Component + 'static) -> Self {
        Node::Component(Box::new(component))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Component(_) => None,
        }
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(group)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Component(_) => f.write_str("Component"),
            Node::Group(g) => f.debug_tuple("Group").field(g).finish(),
        }
    }
}

/// Exposes a child's variable at the group's own scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub child: String,
    /// `None` promotes every top-level name of the child
    pub local: Option<String>,
    pub exposed: Option<String>,
}

/// Directed output -> parameter edge, paths relative to the declaring group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: String,
    pub target: String,
}

/// Composite node: named children plus promotions and connections.
///
/// Promotions and connections are recorded as written and validated by
/// [`crate::Problem::setup`], which reports every problem at once.
#[derive(Debug, Default)]
pub struct Group {
    children: IndexMap<String, Node>,
    promotions: Vec<Promotion>,
    connections: Vec<Connection>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, name: impl Into<String>, node: Node) -> Result<&mut Self, SetupError> {
        let name = name.into();
        check_name(&name)?;
        if self.children.contains_key(&name) {
            return Err(SetupError::DuplicateChildName(name));
        }
        self.children.insert(name, node);
        Ok(self)
    }

    /// Add a leaf component and promote the listed names unchanged.
    ///
    /// `"*"` in `promotes` promotes everything the child exposes.
    pub fn add(
        &mut self,
        name: &str,
        component: impl Component + 'static,
        promotes: &[&str],
    ) -> Result<&mut Self, SetupError> {
        self.add_child(name, Node::component(component))?;
        self.promote_names(name, promotes);
        Ok(self)
    }

    /// Add a nested group and promote the listed names unchanged.
    pub fn add_group(&mut self, name: &str, group: Group, promotes: &[&str]) -> Result<&mut Self, SetupError> {
        self.add_child(name, Node::Group(group))?;
        self.promote_names(name, promotes);
        Ok(self)
    }

    fn promote_names(&mut self, child: &str, promotes: &[&str]) {
        for local in promotes {
            if *local == "*" {
                self.promote_all(child);
            } else {
                self.promote(child, local, local);
            }
        }
    }

    pub fn promote(&mut self, child: &str, local: &str, exposed: &str) -> &mut Self {
        self.promotions.push(Promotion {
            child: child.to_string(),
            local: Some(local.to_string()),
            exposed: Some(exposed.to_string()),
        });
        self
    }

    pub fn promote_all(&mut self, child: &str) -> &mut Self {
        self.promotions.push(Promotion {
            child: child.to_string(),
            local: None,
            exposed: None,
        });
        self
    }

    pub fn connect(&mut self, source: &str, target: &str) -> &mut Self {
        self.connections.push(Connection {
            source: source.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub(crate) fn into_parts(self) -> (IndexMap<String, Node>, Vec<Promotion>, Vec<Connection>) {
        (self.children, self.promotions, self.connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::component::IndepVarComp;

    #[test]
    fn test_duplicate_child_name() {
        let mut g = Group::new();
        g.add("p", IndepVarComp::new("x", 1.0), &[]).unwrap();
        let err = g.add("p", IndepVarComp::new("y", 1.0), &[]).unwrap_err();
        assert_eq!(err, SetupError::DuplicateChildName("p".to_string()));
    }

    #[test]
    fn test_child_name_must_be_single_segment() {
        let mut g = Group::new();
        assert!(g.add("a.b", IndepVarComp::new("x", 1.0), &[]).is_err());
    }

    #[test]
    fn test_promotes_list_records_promotions() {
        let mut g = Group::new();
        g.add("p", IndepVarComp::new("x", 1.0), &["*"]).unwrap();
        g.add("q", IndepVarComp::new("y", 1.0), &["y"]).unwrap();
        assert_eq!(g.promotions().len(), 2);
        assert_eq!(g.promotions()[0].local, None);
        assert_eq!(g.promotions()[1].exposed.as_deref(), Some("y"));
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut g = Group::new();
        g.add("z", IndepVarComp::new("x", 1.0), &[]).unwrap();
        g.add_group("a", Group::new(), &[]).unwrap();
        let names: Vec<_> = g.children().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert!(g.child("a").unwrap().as_group().is_some());
    }
}
