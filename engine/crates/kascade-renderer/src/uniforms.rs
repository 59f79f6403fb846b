use glam::{Mat4, Vec3, Vec4};

/// 固定位置的相机，看向 target
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,

    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    /// 相机的上参考向量
    const CAMERA_UP: Vec3 = Vec3::Y;

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Self::CAMERA_UP)
    }

    /// Vulkan 的 NDC 中 Y 轴向下，因此翻转投影矩阵的 Y
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y_deg.to_radians(), aspect, self.z_near, self.z_far);
        proj.y_axis.y *= -1.0;
        proj
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.8, 0.8, 0.6),
            target: Vec3::ZERO,
            fov_y_deg: 45.0,
            z_near: 0.1,
            z_far: 10.0,
        }
    }
}

/// 场景绕 Y 轴旋转的速度
pub const MODEL_ROTATION_DEG_PER_S: f32 = 30.0;

/// set 0 binding 0 的 uniform buffer
///
/// 所有成员都是 16 字节对齐，std140 与 repr(C) 的布局一致
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// model 的 inverse transpose，用于变换法线
    pub normal: Mat4,

    pub camera_pos: Vec4,
    pub view_dir: Vec4,
    pub sun_dir: Vec4,
    pub sun_color: Vec4,
    pub ambient: Vec4,
}

impl FrameUniforms {
    pub fn compute(camera: &Camera, aspect: f32, time_s: f32) -> Self {
        let model = Mat4::from_rotation_y((MODEL_ROTATION_DEG_PER_S * time_s).to_radians());
        Self {
            model,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(aspect),
            normal: model.inverse().transpose(),

            camera_pos: camera.eye.extend(1.0),
            view_dir: camera.forward().extend(0.0),
            sun_dir: Vec3::new(-1.0, 2.0, 2.0).normalize().extend(0.0),
            sun_color: Vec4::new(10.0, 9.8, 8.8, 1.0),
            ambient: Vec4::new(0.1, 0.1, 0.1, 1.0),
        }
    }
}

/// 窗口尺寸为 0 时返回 1，避免投影矩阵出现 NaN
#[inline]
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if width == 0 || height == 0 { 1.0 } else { width as f32 / height as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 4 * 64 + 5 * 16);
    }

    #[test]
    fn test_model_rotation() {
        let camera = Camera::default();
        let at_zero = FrameUniforms::compute(&camera, 1.0, 0.0);
        assert!(at_zero.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));

        // 3 秒转过 90 度，+X 转到 -Z
        let at_three = FrameUniforms::compute(&camera, 1.0, 3.0);
        let x = at_three.model.transform_vector3(Vec3::X);
        assert!(x.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let proj = camera.projection_matrix(1.5);
        let reference = Mat4::perspective_rh(45f32.to_radians(), 1.5, 0.1, 10.0);
        assert_eq!(proj.y_axis.y, -reference.y_axis.y);
        assert_eq!(proj.x_axis, reference.x_axis);
    }

    #[test]
    fn test_view_looks_at_origin() {
        let camera = Camera::default();
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        // 右手系中相机看向 -Z
        assert!(origin_in_view.x.abs() < 1e-5);
        assert!(origin_in_view.y.abs() < 1e-5);
        assert!((origin_in_view.z + camera.eye.length()).abs() < 1e-5);
    }

    #[test]
    fn test_lighting_constants() {
        let u = FrameUniforms::compute(&Camera::default(), 1.0, 0.0);
        assert!((u.sun_dir.truncate().length() - 1.0).abs() < 1e-6);
        assert!(u.sun_dir.y > 0.0 && u.sun_dir.x < 0.0);
        assert_eq!(u.camera_pos, Vec4::new(0.8, 0.8, 0.6, 1.0));
        assert!((u.view_dir.truncate().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(1500, 1200), 1.25);
        assert_eq!(aspect_ratio(0, 1200), 1.0);
    }
}
