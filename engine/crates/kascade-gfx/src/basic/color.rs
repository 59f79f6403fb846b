/// debug label 使用的颜色
pub struct LabelColor;
impl LabelColor {
    const GREEN: glam::Vec4 = glam::vec4(0.0, 1.0, 0.0, 1.0);
    const BLUE: glam::Vec4 = glam::vec4(0.0, 0.0, 1.0, 1.0);
    const YELLOW: glam::Vec4 = glam::vec4(1.0, 1.0, 0.0, 1.0);
    const ORANGE: glam::Vec4 = glam::vec4(1.0, 0.5, 0.0, 1.0);

    pub const COLOR_PASS: glam::Vec4 = Self::BLUE;
    pub const COLOR_CMD: glam::Vec4 = Self::GREEN;
    pub const COLOR_DRAW: glam::Vec4 = Self::YELLOW;
    pub const COLOR_UPLOAD: glam::Vec4 = Self::ORANGE;
}
