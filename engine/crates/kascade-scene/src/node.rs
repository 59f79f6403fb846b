use glam::{Mat4, Quat, Vec3};

use crate::error::{SceneError, SceneResult};

/// 节点的局部变换：TRS 与矩阵二选一
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeTransform {
    Trs {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
    Matrix(Mat4),
}
impl Default for NodeTransform {
    fn default() -> Self {
        NodeTransform::Trs {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}
impl NodeTransform {
    /// TRS: T * R * S；矩阵则原样返回
    pub fn local_matrix(&self) -> Mat4 {
        match self {
            NodeTransform::Trs {
                translation,
                rotation,
                scale,
            } => Mat4::from_scale_rotation_translation(*scale, *rotation, *translation),
            NodeTransform::Matrix(m) => *m,
        }
    }
}

/// 不存在的引用在 GPU 端以 -1 表示
#[inline]
pub fn gpu_index(index: Option<usize>) -> i32 {
    index.map_or(-1, |i| i as i32)
}

#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    pub index: usize,
    pub name: String,

    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub camera: Option<usize>,

    pub transform: NodeTransform,

    pub children: Vec<usize>,
    /// 由 [`link_parents`] 回填
    pub parent: Option<usize>,
}

/// 第二遍：根据每个节点的 children 回填 parent
///
/// 节点关系必须是一个森林：越界的 child、被多个节点引用的 child 以及环都会返回 [`SceneError::Parse`]
pub fn link_parents(nodes: &mut [SceneNode]) -> SceneResult<()> {
    for node in nodes.iter_mut() {
        node.parent = None;
    }

    for parent_idx in 0..nodes.len() {
        for child_pos in 0..nodes[parent_idx].children.len() {
            let child_idx = nodes[parent_idx].children[child_pos];
            let child = nodes
                .get_mut(child_idx)
                .ok_or_else(|| SceneError::Parse(format!("node {} has invalid child {}", parent_idx, child_idx)))?;
            if let Some(prev) = child.parent {
                return Err(SceneError::Parse(format!(
                    "node {} is a child of both node {} and node {}",
                    child_idx, prev, parent_idx
                )));
            }
            child.parent = Some(parent_idx);
        }
    }

    // 每个节点向上最多走 n 步就必须到达根节点
    for start in 0..nodes.len() {
        let mut cur = nodes[start].parent;
        let mut steps = 0;
        while let Some(p) = cur {
            steps += 1;
            if steps > nodes.len() {
                return Err(SceneError::Parse(format!("node hierarchy has a cycle through node {}", start)));
            }
            cur = nodes[p].parent;
        }
    }

    Ok(())
}

/// world matrix 的缓存表，按节点下标索引
///
/// `mark_dirty` 只会标记当前节点，不会传播到子节点
pub struct WorldMatrixCache {
    matrices: Vec<Mat4>,
    dirty: Vec<bool>,
}

// new & init
impl WorldMatrixCache {
    /// 初始状态全部为 dirty
    pub fn new(node_cnt: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; node_cnt],
            dirty: vec![true; node_cnt],
        }
    }
}

// getters
impl WorldMatrixCache {
    #[inline]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    #[inline]
    pub fn is_dirty(&self, node: usize) -> bool {
        self.dirty[node]
    }

    /// 缓存中的值，不会重新计算
    #[inline]
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }
}

// update
impl WorldMatrixCache {
    #[inline]
    pub fn mark_dirty(&mut self, node: usize) {
        self.dirty[node] = true;
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// 如果缓存是 dirty 的，先解析 parent 的 world matrix，再计算 parent * local
    pub fn world_matrix(&mut self, nodes: &[SceneNode], node: usize) -> Mat4 {
        if !self.dirty[node] {
            return self.matrices[node];
        }

        let local = nodes[node].transform.local_matrix();
        let world = match nodes[node].parent {
            Some(parent) => self.world_matrix(nodes, parent) * local,
            None => local,
        };

        self.matrices[node] = world;
        self.dirty[node] = false;
        world
    }

    /// 确保所有节点都是最新的
    pub fn refresh_all(&mut self, nodes: &[SceneNode]) -> &[Mat4] {
        for idx in 0..nodes.len() {
            self.world_matrix(nodes, idx);
        }
        &self.matrices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trs_node(index: usize, translation: Vec3, children: Vec<usize>) -> SceneNode {
        SceneNode {
            index,
            transform: NodeTransform::Trs {
                translation,
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
            },
            children,
            ..Default::default()
        }
    }

    /// 0 -> 1 -> 2，另外 3 是独立的根
    fn chain() -> Vec<SceneNode> {
        let mut nodes = vec![
            trs_node(0, Vec3::new(1.0, 0.0, 0.0), vec![1]),
            trs_node(1, Vec3::new(0.0, 2.0, 0.0), vec![2]),
            SceneNode {
                index: 2,
                transform: NodeTransform::Matrix(Mat4::from_scale(Vec3::splat(2.0))),
                ..Default::default()
            },
            trs_node(3, Vec3::new(0.0, 0.0, 5.0), vec![]),
        ];
        link_parents(&mut nodes).unwrap();
        nodes
    }

    #[test]
    fn test_identity_trs_is_identity() {
        assert_eq!(NodeTransform::default().local_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_trs_order() {
        let transform = NodeTransform::Trs {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_quat(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            * Mat4::from_scale(Vec3::splat(2.0));
        assert!(transform.local_matrix().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_link_parents() {
        let nodes = chain();
        assert_eq!(nodes[0].parent, None);
        assert_eq!(nodes[1].parent, Some(0));
        assert_eq!(nodes[2].parent, Some(1));
        assert_eq!(nodes[3].parent, None);
    }

    #[test]
    fn test_link_parents_rejects_invalid_graphs() {
        let mut out_of_range = vec![trs_node(0, Vec3::ZERO, vec![7])];
        assert!(matches!(link_parents(&mut out_of_range), Err(SceneError::Parse(_))));

        let mut shared = vec![
            trs_node(0, Vec3::ZERO, vec![2]),
            trs_node(1, Vec3::ZERO, vec![2]),
            trs_node(2, Vec3::ZERO, vec![]),
        ];
        assert!(matches!(link_parents(&mut shared), Err(SceneError::Parse(_))));

        let mut cycle = vec![trs_node(0, Vec3::ZERO, vec![1]), trs_node(1, Vec3::ZERO, vec![0])];
        assert!(matches!(link_parents(&mut cycle), Err(SceneError::Parse(_))));
    }

    #[test]
    fn test_root_world_equals_local() {
        let nodes = chain();
        let mut cache = WorldMatrixCache::new(nodes.len());
        assert_eq!(cache.world_matrix(&nodes, 0), nodes[0].transform.local_matrix());
        assert_eq!(cache.world_matrix(&nodes, 3), nodes[3].transform.local_matrix());
    }

    #[test]
    fn test_child_world_composes_parent() {
        let nodes = chain();
        let mut cache = WorldMatrixCache::new(nodes.len());
        for idx in [1, 2] {
            let parent = nodes[idx].parent.unwrap();
            let expected = cache.world_matrix(&nodes, parent) * nodes[idx].transform.local_matrix();
            assert_eq!(cache.world_matrix(&nodes, idx), expected);
        }

        let p = cache.world_matrix(&nodes, 2).transform_point3(Vec3::ONE);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 4.0, 2.0), 1e-5));
    }

    #[test]
    fn test_mark_dirty_does_not_propagate() {
        let mut nodes = chain();
        let mut cache = WorldMatrixCache::new(nodes.len());
        cache.refresh_all(&nodes);
        let stale_child = cache.world_matrix(&nodes, 1);

        nodes[0].transform = NodeTransform::Matrix(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        cache.mark_dirty(0);
        assert!(cache.is_dirty(0));
        assert!(!cache.is_dirty(1));

        // 子节点仍然返回旧的缓存
        assert_eq!(cache.world_matrix(&nodes, 1), stale_child);

        cache.mark_all_dirty();
        let fresh_child = cache.world_matrix(&nodes, 1);
        assert_ne!(fresh_child, stale_child);
        assert_eq!(fresh_child.w_axis.x, 10.0);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let nodes = chain();
        let mut cache = WorldMatrixCache::new(nodes.len());
        let first = cache.refresh_all(&nodes).to_vec();
        cache.mark_all_dirty();
        let second = cache.refresh_all(&nodes).to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gpu_index() {
        assert_eq!(gpu_index(None), -1);
        assert_eq!(gpu_index(Some(3)), 3);
    }
}
