use ash::vk;

/// Vertex Buffer 中顶点布局的 trait 定义
///
/// 定义 pipeline 创建时需要的 Binding 和 Attribute 描述
pub trait GfxVertexLayout {
    fn vertex_input_bindings() -> Vec<vk::VertexInputBindingDescription>;

    fn vertex_input_attributes() -> Vec<vk::VertexInputAttributeDescription>;
}
