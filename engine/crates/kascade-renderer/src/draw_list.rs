use kascade_scene::{model::GltfModel, node::SceneNode};

/// 每次 draw 之前推送的常量，与 shader 中的 push_constant block 对应
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PushConstants {
    /// transform storage buffer 中的下标
    pub node_index: i32,
    /// material storage buffer 中的下标
    pub material_index: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawItem {
    pub node: usize,
    pub mesh: usize,
    pub primitive: usize,
    /// 已经替换为默认材质的下标
    pub material: usize,
}

impl DrawItem {
    #[inline]
    pub fn push_constants(&self) -> PushConstants {
        PushConstants {
            node_index: self.node as i32,
            material_index: self.material as i32,
        }
    }
}

/// 从每个 root 开始深度优先遍历，每个带 mesh 的 node 的每个 primitive 生成一个 draw
///
/// # 参数
/// - `primitive_materials`: 按 mesh 下标索引，每个 mesh 内按 primitive 顺序给出材质
/// - `default_material`: 没有材质的 primitive 使用的材质
///
/// node 先于它的 children 输出，children 按声明顺序遍历
pub fn build_draw_list(
    nodes: &[SceneNode],
    roots: &[usize],
    primitive_materials: &[Vec<Option<usize>>],
    default_material: usize,
) -> Vec<DrawItem> {
    let mut draws = Vec::new();
    // 栈中逆序压入，保证弹出顺序与声明顺序一致
    let mut stack = roots.iter().rev().copied().collect::<Vec<_>>();

    while let Some(node_idx) = stack.pop() {
        let Some(node) = nodes.get(node_idx) else {
            log::warn!("draw list skips missing node {}", node_idx);
            continue;
        };

        let mesh_materials = node.mesh.and_then(|mesh| primitive_materials.get(mesh).map(|m| (mesh, m)));
        if let Some((mesh, materials)) = mesh_materials {
            draws.extend(materials.iter().enumerate().map(|(primitive, material)| DrawItem {
                node: node_idx,
                mesh,
                primitive,
                material: material.unwrap_or(default_material),
            }));
        }

        stack.extend(node.children.iter().rev().copied());
    }

    draws
}

/// 模型的层级在加载之后不再改变，draw list 只需要构建一次
pub fn build_model_draw_list(model: &GltfModel) -> Vec<DrawItem> {
    let primitive_materials = model
        .meshes()
        .iter()
        .map(|mesh| mesh.primitives.iter().map(|p| p.material).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    build_draw_list(model.nodes(), model.roots(), &primitive_materials, model.default_material())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kascade_scene::node::{NodeTransform, link_parents};

    fn node(index: usize, mesh: Option<usize>, children: Vec<usize>) -> SceneNode {
        SceneNode {
            index,
            name: format!("node-{}", index),
            mesh,
            skin: None,
            camera: None,
            transform: NodeTransform::default(),
            children,
            parent: None,
        }
    }

    #[test]
    fn test_root_child_single_draw() {
        let mut nodes = vec![node(0, None, vec![1]), node(1, Some(0), vec![])];
        link_parents(&mut nodes).unwrap();

        let draws = build_draw_list(&nodes, &[0], &[vec![None]], 0);
        assert_eq!(
            draws,
            vec![DrawItem {
                node: 1,
                mesh: 0,
                primitive: 0,
                material: 0
            }]
        );
        assert_eq!(
            draws[0].push_constants(),
            PushConstants {
                node_index: 1,
                material_index: 0
            }
        );
    }

    #[test]
    fn test_depth_first_order() {
        //      0        3
        //    /   \
        //   1     2
        //   |
        //   4
        let mut nodes = vec![
            node(0, Some(0), vec![1, 2]),
            node(1, Some(1), vec![4]),
            node(2, Some(0), vec![]),
            node(3, Some(1), vec![]),
            node(4, Some(0), vec![]),
        ];
        link_parents(&mut nodes).unwrap();

        let materials = vec![vec![Some(2)], vec![Some(1), None]];
        let draws = build_draw_list(&nodes, &[0, 3], &materials, 7);

        let order = draws.iter().map(|d| (d.node, d.primitive, d.material)).collect::<Vec<_>>();
        assert_eq!(order, vec![(0, 0, 2), (1, 0, 1), (1, 1, 7), (4, 0, 2), (2, 0, 2), (3, 0, 1), (3, 1, 7)]);
    }

    #[test]
    fn test_push_constant_size() {
        assert_eq!(std::mem::size_of::<PushConstants>(), 8);
    }

    #[test]
    fn test_empty_scene() {
        assert!(build_draw_list(&[], &[], &[], 0).is_empty());
    }
}
