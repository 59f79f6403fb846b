#[derive(Debug)]
pub struct Timer {
    last_tick: std::time::Instant,

    delta_time: std::time::Duration,
    total_time: std::time::Duration,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            last_tick: std::time::Instant::now(),
            delta_time: std::time::Duration::ZERO,
            total_time: std::time::Duration::ZERO,
        }
    }
}

impl Timer {
    /// 每帧开始的时候调用
    pub fn tick(&mut self) {
        let now = std::time::Instant::now();
        self.delta_time = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.total_time += self.delta_time;
    }

    /// 上一帧的时间（秒）
    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.delta_time.as_secs_f32()
    }

    /// 总运行时间
    #[inline]
    pub fn total_time_s(&self) -> f32 {
        self.total_time.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_accumulates() {
        let mut timer = Timer::default();
        assert_eq!(timer.total_time_s(), 0.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        timer.tick();
        assert!(timer.delta_time_s() > 0.0);
        assert_eq!(timer.total_time_s(), timer.delta_time_s());
    }
}
