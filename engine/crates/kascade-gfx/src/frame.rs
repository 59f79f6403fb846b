use std::{fmt::Display, rc::Rc};

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, fence::GfxFence, semaphore::GfxSemaphore,
    },
    error::{GfxError, GfxResult},
    foundation::device::GfxDevice,
};

/// frames in flight 的数量，显式传递给所有需要它的组件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    pub frames_in_flight: usize,
}
impl Default for FrameConfig {
    fn default() -> Self {
        Self { frames_in_flight: 2 }
    }
}
impl FrameConfig {
    pub fn new(frames_in_flight: usize) -> GfxResult<Self> {
        if frames_in_flight == 0 {
            return Err(GfxError::InvalidArgument("frames_in_flight must be at least 1".to_string()));
        }
        Ok(Self { frames_in_flight })
    }
}

/// 一个 frame slot 在一帧之内的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotEvent {
    /// fence 已经等待完成，开始 acquire
    BeginAcquire,
    /// 成功拿到 swapchain image
    Acquired,
    /// acquire 时 swapchain out of date，本帧放弃
    OutOfDate,
    Submit,
    Present,
    /// present 完成（包括 suboptimal/out-of-date 之后的重建）
    Finish,
}

impl SlotState {
    /// 非法的状态转换返回 None
    pub fn advance(self, event: SlotEvent) -> Option<SlotState> {
        use SlotEvent as E;
        use SlotState as S;
        match (self, event) {
            (S::Idle, E::BeginAcquire) => Some(S::Acquiring),
            (S::Acquiring, E::Acquired) => Some(S::Recording),
            (S::Acquiring, E::OutOfDate) => Some(S::Idle),
            (S::Recording, E::Submit) => Some(S::Submitted),
            (S::Submitted, E::Present) => Some(S::Presenting),
            (S::Presenting, E::Finish) => Some(S::Idle),
            _ => None,
        }
    }
}

/// 每个 frame in flight 独占的同步对象与 command buffer
pub struct FrameSlot {
    pub image_available: GfxSemaphore,
    pub render_finished: GfxSemaphore,
    /// 创建时即为 signaled，第一帧的 wait 不会阻塞
    pub in_flight: GfxFence,
    pub cmd: GfxCommandBuffer,

    state: SlotState,
}

// new & init
impl FrameSlot {
    pub fn new(device: &Rc<GfxDevice>, command_pool: &GfxCommandPool, label: FrameLabel) -> GfxResult<Self> {
        Ok(Self {
            image_available: GfxSemaphore::new(device.clone(), &format!("image-available-{}", label))?,
            render_finished: GfxSemaphore::new(device.clone(), &format!("render-finished-{}", label))?,
            in_flight: GfxFence::new(device.clone(), true, &format!("in-flight-{}", label))?,
            cmd: GfxCommandBuffer::new(command_pool, &format!("frame-{}", label))?,
            state: SlotState::Idle,
        })
    }

    /// 按 `FrameConfig` 创建所有 slot
    pub fn create_slots(
        device: &Rc<GfxDevice>,
        command_pool: &GfxCommandPool,
        config: FrameConfig,
    ) -> GfxResult<Vec<FrameSlot>> {
        (0..config.frames_in_flight).map(|idx| Self::new(device, command_pool, FrameLabel(idx))).collect()
    }
}

// getters
impl FrameSlot {
    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }
}

// update
impl FrameSlot {
    /// 非法转换时保持原状态并返回错误
    pub fn transition(&mut self, event: SlotEvent) -> GfxResult<SlotState> {
        match self.state.advance(event) {
            Some(next) => {
                self.state = next;
                Ok(next)
            }
            None => Err(GfxError::InvalidArgument(format!(
                "invalid frame slot transition: {:?} + {:?}",
                self.state, event
            ))),
        }
    }
}

/// slot 的标签：A, B, C ...
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLabel(pub usize);
impl Display for FrameLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = (b'A' + (self.0 % 26) as u8) as char;
        write!(f, "{}", c)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    frames_in_flight: usize,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, config: FrameConfig) -> Self {
        Self {
            frame_id: init_frame_id,
            frames_in_flight: config.frames_in_flight.max(1),
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
    #[inline]
    pub fn slot_index(&self) -> usize {
        (self.frame_id % self.frames_in_flight as u64) as usize
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel(self.slot_index())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_full_cycle() {
        let mut state = SlotState::Idle;
        for event in [SlotEvent::BeginAcquire, SlotEvent::Acquired, SlotEvent::Submit, SlotEvent::Present] {
            state = state.advance(event).unwrap();
        }
        assert_eq!(state, SlotState::Presenting);
        assert_eq!(state.advance(SlotEvent::Finish), Some(SlotState::Idle));
    }

    #[test]
    fn test_slot_out_of_date_returns_to_idle() {
        let state = SlotState::Idle.advance(SlotEvent::BeginAcquire).unwrap();
        assert_eq!(state.advance(SlotEvent::OutOfDate), Some(SlotState::Idle));
    }

    #[test]
    fn test_slot_invalid_transitions() {
        assert_eq!(SlotState::Idle.advance(SlotEvent::Submit), None);
        assert_eq!(SlotState::Recording.advance(SlotEvent::OutOfDate), None);
        assert_eq!(SlotState::Submitted.advance(SlotEvent::Acquired), None);
        assert_eq!(SlotState::Presenting.advance(SlotEvent::BeginAcquire), None);
    }

    #[test]
    fn test_frame_counter_slot_wraps() {
        let mut counter = FrameCounter::new(0, FrameConfig::default());
        let slots = (0..5)
            .map(|_| {
                let idx = counter.slot_index();
                counter.next_frame();
                idx
            })
            .collect::<Vec<_>>();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(counter.frame_id(), 5);
    }

    #[test]
    fn test_frame_name() {
        let counter = FrameCounter::new(4, FrameConfig::new(3).unwrap());
        assert_eq!(counter.frame_label(), FrameLabel(1));
        assert_eq!(counter.frame_name(), "[F4B]");
    }

    #[test]
    fn test_frame_config_rejects_zero() {
        assert!(FrameConfig::new(0).is_err());
        assert_eq!(FrameConfig::default().frames_in_flight, 2);
    }
}
