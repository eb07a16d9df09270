//! Plan tree traversal module.

pub const NODE_CAPACITY: usize = 32;

/// Pair of (level of the node in traversal algorithm, node).
#[derive(Debug, PartialEq)]
pub struct LevelNode<T>(pub usize, pub T)
where
    T: Copy;

/// Parent-before-children traversal over a plan tree.
pub struct PreOrder<F, I, T>
where
    F: FnMut(T) -> I,
    I: Iterator<Item = T>,
    T: Copy,
{
    iter_children: F,
    nodes: Vec<LevelNode<T>>,
}

impl<F, I, T> PreOrder<F, I, T>
where
    F: FnMut(T) -> I,
    I: Iterator<Item = T>,
    T: Copy,
{
    pub fn into_iter(self, root: T) -> impl Iterator<Item = LevelNode<T>> {
        self.populate_nodes(root).into_iter()
    }

    pub fn populate_nodes(mut self, root: T) -> Vec<LevelNode<T>> {
        self.nodes.clear();
        self.traverse(root, 0);
        self.nodes
    }

    fn traverse(&mut self, root: T, level: usize) {
        self.nodes.push(LevelNode(level, root));
        for child in (self.iter_children)(root) {
            self.traverse(child, level + 1);
        }
    }

    pub fn with_capacity(iter_children: F, capacity: usize) -> Self {
        Self {
            iter_children,
            nodes: Vec::with_capacity(capacity),
        }
    }
}
