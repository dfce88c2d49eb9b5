use super::metadata::smplh_metadata;
use crate::error::{StructuralError, StructuralResult};

/// Immutable joint hierarchy. Construction guarantees a single root and that
/// every parent index is smaller than its child, so walking joints in
/// ascending index order always visits a parent before its children.
#[derive(Clone, Debug, PartialEq)]
pub struct KinematicTree {
    parents: Vec<Option<usize>>,
    names: Vec<String>,
    children: Vec<Vec<usize>>,
    root: usize,
    preferred_child: Vec<Option<usize>>,
}

impl KinematicTree {
    /// # Errors
    /// Returns a ``StructuralError`` for an empty tree, name/parent count
    /// mismatch, out of range parents, zero or several roots, cycles and
    /// parents listed after their children.
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(parents: Vec<Option<usize>>, names: Vec<String>) -> StructuralResult<Self> {
        let n = parents.len();
        if n == 0 {
            return Err(StructuralError::Empty);
        }
        if names.len() != n {
            return Err(StructuralError::NameCountMismatch {
                parents: n,
                names: names.len(),
            });
        }
        for (joint, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) if *p >= n => {
                    return Err(StructuralError::ParentOutOfRange {
                        joint,
                        parent: *p as i64,
                    })
                }
                Some(p) if *p == joint => return Err(StructuralError::Cycle { joint }),
                _ => {}
            }
        }
        let roots: Vec<usize> = parents
            .iter()
            .enumerate()
            .filter_map(|(joint, parent)| parent.is_none().then_some(joint))
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(StructuralError::NoRoot),
            [root] => *root,
            _ => return Err(StructuralError::MultipleRoots(roots)),
        };
        // any ancestor chain longer than the joint count loops
        for joint in 0..n {
            let mut cur = joint;
            let mut steps = 0;
            while let Some(p) = parents[cur] {
                cur = p;
                steps += 1;
                if steps > n {
                    return Err(StructuralError::Cycle { joint });
                }
            }
        }
        for (joint, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                if *p > joint {
                    return Err(StructuralError::ParentAfterChild { joint, parent: *p });
                }
            }
        }

        let mut children = vec![Vec::new(); n];
        for (joint, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(joint);
            }
        }

        Ok(Self {
            parents,
            names,
            children,
            root,
            preferred_child: vec![None; n],
        })
    }

    /// Builds a tree from the ``-1 = root`` parent convention used by SMPL
    /// model files.
    ///
    /// # Errors
    /// Same as ``KinematicTree::new``, plus negative parents other than -1.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_parent_ids(parent_ids: &[i32], names: Vec<String>) -> StructuralResult<Self> {
        let parents = parent_ids
            .iter()
            .enumerate()
            .map(|(joint, &p)| match p {
                -1 => Ok(None),
                p if p >= 0 => Ok(Some(p as usize)),
                p => Err(StructuralError::ParentOutOfRange {
                    joint,
                    parent: i64::from(p),
                }),
            })
            .collect::<StructuralResult<Vec<_>>>()?;
        Self::new(parents, names)
    }

    /// The 52 joint SMPL-H body and hands tree. The pelvis points its bone
    /// along the spine rather than at its first child, the left hip.
    #[allow(clippy::missing_panics_doc)]
    pub fn smpl_h() -> Self {
        let meta = smplh_metadata();
        #[allow(clippy::expect_used)]
        let tree = Self::from_parent_ids(&meta.joint_parents, meta.joint_names).expect("the built-in SMPL-H hierarchy is well formed");
        meta.preferred_children
            .into_iter()
            .fold(tree, |tree, (joint, child)| tree.with_preferred_child(joint, child))
    }

    /// Marks ``child`` as the bone a joint is aimed along during retargeting.
    /// Ignored when ``child`` is not a direct child of ``joint``.
    #[must_use]
    pub fn with_preferred_child(mut self, joint: usize, child: usize) -> Self {
        if joint < self.num_joints() && self.children[joint].contains(&child) {
            self.preferred_child[joint] = Some(child);
        }
        self
    }

    pub fn num_joints(&self) -> usize {
        self.parents.len()
    }
    pub fn root(&self) -> usize {
        self.root
    }
    pub fn parent(&self, joint: usize) -> Option<usize> {
        self.parents[joint]
    }
    pub fn parents(&self) -> &[Option<usize>] {
        &self.parents
    }
    pub fn children(&self, joint: usize) -> &[usize] {
        &self.children[joint]
    }
    pub fn name(&self, joint: usize) -> &str {
        &self.names[joint]
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
    pub fn is_leaf(&self, joint: usize) -> bool {
        self.children[joint].is_empty()
    }
    pub fn preferred_child(&self, joint: usize) -> Option<usize> {
        self.preferred_child[joint]
    }

    /// Children of ``joint`` with the preferred one, if any, first
    pub fn children_by_preference(&self, joint: usize) -> Vec<usize> {
        let mut ordered = self.children[joint].clone();
        if let Some(pref) = self.preferred_child[joint] {
            ordered.retain(|c| *c != pref);
            ordered.insert(0, pref);
        }
        ordered
    }

    /// ``joint`` followed by all of its ancestors up to and including the root
    pub fn chain_to_root(&self, joint: usize) -> Vec<usize> {
        let mut chain = vec![joint];
        let mut cur = joint;
        while let Some(p) = self.parents[cur] {
            chain.push(p);
            cur = p;
        }
        chain
    }

    /// Parent ids with the root as ``-1``, the layout written to output files
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn parent_ids(&self) -> Vec<i32> {
        self.parents.iter().map(|p| p.map_or(-1, |p| p as i32)).collect()
    }

    /// # Errors
    /// ``StructuralError::LengthMismatch`` when ``len`` differs from the joint
    /// count
    pub fn check_len(&self, what: &'static str, len: usize) -> StructuralResult<()> {
        if len == self.num_joints() {
            Ok(())
        } else {
            Err(StructuralError::LengthMismatch {
                what,
                expected: self.num_joints(),
                got: len,
            })
        }
    }
}
