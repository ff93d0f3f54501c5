//! Octree bounding volume tree.
//!
//! Nodes live in an arena and refer to their parent and children by index.
//! A primitive whose box overlaps several octants is stored in each of
//! them, so a hit only counts in the leaf whose box contains the hit point.
//! Traversal walks the leaves the ray passes in order and stops at the
//! first leaf that produces a valid hit.

use octa_core::BvtParams;
use octa_math::{Aabb, Ray, Vec3};

use crate::hit::{Hit, Hittable, MaterialId, Primitive};

/// Extra scale on the root cube so primitives on its faces stay inside.
const ROOT_SCALE: f64 = 1.0 + 1e-10;

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(Vec<u32>),
    Internal([usize; 8]),
}

#[derive(Debug, Clone)]
struct Node {
    space: Aabb,
    parent: Option<usize>,
    kind: NodeKind,
}

/// Octree over a primitive slice. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct Bvt {
    nodes: Vec<Node>,
    epsilon: f64,
}

impl Bvt {
    /// Build a tree over `primitives`.
    ///
    /// Returns `None` when there is nothing to build over or the tree ends
    /// up smaller than `params.node_threshold`, in which case a linear scan
    /// is just as fast.
    pub fn build(primitives: &[Primitive], params: &BvtParams) -> Option<Self> {
        if primitives.is_empty() {
            return None;
        }

        let boxes: Vec<Aabb> = primitives.iter().map(|p| p.bounding_box()).collect();
        let root = Aabb::enclosing(boxes.iter().copied()).cubed(ROOT_SCALE);

        let mut tree = Self {
            nodes: Vec::new(),
            epsilon: params.epsilon,
        };
        let all: Vec<u32> = (0..primitives.len() as u32).collect();
        tree.build_node(None, all, root, params.max_depth, &boxes, params.threshold);

        log::info!(
            "BVT: {} nodes over {} primitives",
            tree.node_count(),
            primitives.len()
        );

        if tree.node_count() < params.node_threshold {
            log::info!(
                "BVT: fewer than {} nodes, using linear scan",
                params.node_threshold
            );
            return None;
        }
        Some(tree)
    }

    fn build_node(
        &mut self,
        parent: Option<usize>,
        set: Vec<u32>,
        space: Aabb,
        depth: u32,
        boxes: &[Aabb],
        threshold: usize,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            space,
            parent,
            kind: NodeKind::Leaf(Vec::new()),
        });

        if depth == 0 || set.len() <= threshold {
            self.nodes[index].kind = NodeKind::Leaf(set);
            return index;
        }

        let mut children = [0usize; 8];
        for (slot, octant) in children.iter_mut().zip(space.subdivide()) {
            let here: Vec<u32> = set
                .iter()
                .copied()
                .filter(|&i| boxes[i as usize].intersects(&octant))
                .collect();
            *slot = self.build_node(Some(index), here, octant, depth - 1, boxes, threshold);
        }
        self.nodes[index].kind = NodeKind::Internal(children);
        index
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root_space(&self) -> Aabb {
        self.nodes[0].space
    }

    /// Descend from `from` to the leaf containing `p`.
    fn find_leaf(&self, from: usize, p: Vec3) -> usize {
        let mut current = from;
        while let NodeKind::Internal(children) = &self.nodes[current].kind {
            let c = self.nodes[current].space.center();
            let octant = 4 * (p.x >= c.x) as usize + 2 * (p.y >= c.y) as usize + (p.z >= c.z) as usize;
            current = children[octant];
        }
        current
    }

    /// Nearest ancestor of `node` whose space contains `p`.
    fn find_next_parent(&self, node: usize, p: Vec3) -> Option<usize> {
        let mut current = self.nodes[node].parent?;
        while !self.nodes[current].space.contains(p) {
            current = self.nodes[current].parent?;
        }
        Some(current)
    }

    fn leaf_items(&self, leaf: usize) -> &[u32] {
        match &self.nodes[leaf].kind {
            NodeKind::Leaf(items) => items,
            NodeKind::Internal(_) => &[],
        }
    }

    /// Step to just past the leaf's exit, never backwards.
    fn advance(&self, leaf: usize, ray: &Ray, t: f64) -> f64 {
        self.nodes[leaf].space.exit(ray).max(t) + self.epsilon
    }

    /// Closest hit along `ray`. Same result as a brute-force scan.
    pub fn nearest_hit(&self, primitives: &[Primitive], ray: &Ray) -> Option<Hit> {
        let span = self.root_space().entry_exit(ray)?;
        let mut t = span.min + self.epsilon;
        let mut current = Some(0);

        while let Some(node) = current {
            let leaf = self.find_leaf(node, ray.at(t));
            let space = self.nodes[leaf].space;

            let mut best: Option<Hit> = None;
            for &i in self.leaf_items(leaf) {
                if let Some(hit) = primitives[i as usize].hit(ray) {
                    let closer = best.map_or(true, |b| hit.distance < b.distance);
                    if closer && space.contains(hit.point) {
                        best = Some(hit);
                    }
                }
            }
            if best.is_some() {
                return best;
            }

            t = self.advance(leaf, ray, t);
            current = self.find_next_parent(leaf, ray.at(t));
        }

        None
    }

    /// Light transmission along `ray` up to `max_dist`.
    ///
    /// Each occluder nearer than `max_dist` multiplies the result by its
    /// transparency; an opaque one returns 0 at once. The walk ends after
    /// the first leaf holding a hit beyond `max_dist`.
    pub fn transmission<F>(
        &self,
        primitives: &[Primitive],
        ray: &Ray,
        max_dist: f64,
        mut transparency: F,
    ) -> f64
    where
        F: FnMut(MaterialId) -> f64,
    {
        let root = self.root_space();
        let mut t = if root.contains(ray.origin) {
            0.0
        } else {
            match root.entry_exit(ray) {
                Some(span) => span.min + self.epsilon,
                None => return 1.0,
            }
        };

        let mut factor = 1.0;
        let mut counted: Vec<u32> = Vec::new();
        let mut current = Some(0);

        while let Some(node) = current {
            let leaf = self.find_leaf(node, ray.at(t));
            let space = self.nodes[leaf].space;
            let mut too_far = false;

            for &i in self.leaf_items(leaf) {
                if counted.contains(&i) {
                    continue;
                }
                let Some(hit) = primitives[i as usize].hit(ray) else {
                    continue;
                };
                if !space.contains(hit.point) {
                    continue;
                }

                if hit.distance < max_dist {
                    let tr = transparency(hit.material);
                    if tr <= 0.0 {
                        return 0.0;
                    }
                    factor *= tr;
                    counted.push(i);
                } else {
                    too_far = true;
                }
            }

            if too_far {
                return factor;
            }

            t = self.advance(leaf, ray, t);
            current = self.find_next_parent(leaf, ray.at(t));
        }

        factor
    }
}

/// Linear-scan version of [`Bvt::transmission`].
pub fn transmission_linear<F>(
    primitives: &[Primitive],
    ray: &Ray,
    max_dist: f64,
    mut transparency: F,
) -> f64
where
    F: FnMut(MaterialId) -> f64,
{
    let mut factor = 1.0;
    for p in primitives {
        if let Some(hit) = p.hit(ray) {
            if hit.distance < max_dist {
                let tr = transparency(hit.material);
                if tr <= 0.0 {
                    return 0.0;
                }
                factor *= tr;
            }
        }
    }
    factor
}
