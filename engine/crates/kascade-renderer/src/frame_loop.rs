use kascade_gfx::{
    frame::{FrameCounter, SlotEvent, SlotState},
    swapchain::render_swapchain::{AcquireOutcome, PresentOutcome},
};

use crate::error::RendererResult;

/// 一帧中与 GPU 打交道的各个步骤
///
/// [`run_frame`] 只负责步骤之间的顺序与 swapchain 重建的时机，
/// 具体的 Vulkan 调用由实现者完成
pub trait FrameTarget {
    /// framebuffer 尺寸为 0（窗口最小化）时不能创建 swapchain
    fn is_minimized(&self) -> bool;

    /// 等待 slot 上一次提交的 fence，`u64::MAX` 超时
    fn wait_slot(&mut self, slot: usize) -> RendererResult<()>;

    fn slot_transition(&mut self, slot: usize, event: SlotEvent) -> RendererResult<SlotState>;

    fn acquire(&mut self, slot: usize) -> RendererResult<AcquireOutcome>;

    /// 等待 GPU 空闲，销毁依赖 swapchain image view 的 framebuffer 和附件
    fn destroy_targets(&mut self) -> RendererResult<()>;

    fn recreate_swapchain(&mut self) -> RendererResult<()>;

    /// 基于新的 swapchain 重新创建 framebuffer 和附件
    fn create_targets(&mut self) -> RendererResult<()>;

    /// 更新每帧数据，录制 command buffer，重置 fence 并提交
    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RendererResult<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameResult {
    Rendered,
    /// 没有提交任何工作，frame counter 也没有前进
    Skipped,
}

/// 按依赖的逆序销毁，再按依赖顺序重建：targets -> swapchain -> targets
///
/// 窗口最小化时无法创建 swapchain，保留 `resized` 等窗口恢复之后再重建
pub fn rebuild_swapchain<T: FrameTarget>(target: &mut T, resized: &mut bool) -> RendererResult<()> {
    if target.is_minimized() {
        log::info!("window minimized, delay swapchain recreation");
        *resized = true;
        return Ok(());
    }

    target.destroy_targets()?;
    target.recreate_swapchain()?;
    target.create_targets()?;
    *resized = false;
    Ok(())
}

/// 执行一帧
///
/// - acquire 时 out of date：重建 swapchain 之后直接返回，不录制也不推进帧号
/// - present 返回 suboptimal / out of date，或者外部设置了 `resized`：present 之后重建
pub fn run_frame<T: FrameTarget>(
    target: &mut T,
    counter: &mut FrameCounter,
    resized: &mut bool,
) -> RendererResult<FrameResult> {
    if target.is_minimized() {
        return Ok(FrameResult::Skipped);
    }

    let slot = counter.slot_index();
    target.wait_slot(slot)?;

    target.slot_transition(slot, SlotEvent::BeginAcquire)?;
    let (image_index, acquire_suboptimal) = match target.acquire(slot)? {
        AcquireOutcome::Acquired { index, suboptimal } => (index, suboptimal),
        AcquireOutcome::OutOfDate => {
            log::info!("{} swapchain out of date on acquire, recreate", counter.frame_name());
            target.slot_transition(slot, SlotEvent::OutOfDate)?;
            rebuild_swapchain(target, resized)?;
            return Ok(FrameResult::Skipped);
        }
    };
    target.slot_transition(slot, SlotEvent::Acquired)?;

    target.record_and_submit(slot, image_index)?;
    target.slot_transition(slot, SlotEvent::Submit)?;

    let present = target.present(slot, image_index)?;
    target.slot_transition(slot, SlotEvent::Present)?;

    if present.needs_recreate() || acquire_suboptimal || *resized {
        log::info!("{} recreate swapchain after present: {:?}, resized: {}", counter.frame_name(), present, resized);
        rebuild_swapchain(target, resized)?;
    }
    target.slot_transition(slot, SlotEvent::Finish)?;

    counter.next_frame();
    Ok(FrameResult::Rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RendererError;
    use kascade_gfx::{error::GfxError, frame::FrameConfig};

    /// 记录调用顺序的 target
    struct MockTarget {
        calls: Vec<String>,
        slots: Vec<SlotState>,
        acquire_results: Vec<AcquireOutcome>,
        present_result: PresentOutcome,
        minimized: bool,
        /// acquire 之后窗口被最小化
        minimize_on_acquire: bool,
    }

    impl MockTarget {
        fn new(slot_cnt: usize) -> Self {
            Self {
                calls: vec![],
                slots: vec![SlotState::Idle; slot_cnt],
                acquire_results: vec![],
                present_result: PresentOutcome::Presented,
                minimized: false,
                minimize_on_acquire: false,
            }
        }

        fn count(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| c.starts_with(name)).count()
        }
    }

    impl FrameTarget for MockTarget {
        fn is_minimized(&self) -> bool {
            self.minimized
        }

        fn wait_slot(&mut self, slot: usize) -> RendererResult<()> {
            self.calls.push(format!("wait-{}", slot));
            Ok(())
        }

        fn slot_transition(&mut self, slot: usize, event: SlotEvent) -> RendererResult<SlotState> {
            let next = self.slots[slot]
                .advance(event)
                .ok_or_else(|| RendererError::Gfx(GfxError::InvalidArgument(format!("{:?}", event))))?;
            self.slots[slot] = next;
            Ok(next)
        }

        fn acquire(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
            self.calls.push(format!("acquire-{}", slot));
            if self.minimize_on_acquire {
                self.minimized = true;
            }
            Ok(if self.acquire_results.is_empty() {
                AcquireOutcome::Acquired {
                    index: 0,
                    suboptimal: false,
                }
            } else {
                self.acquire_results.remove(0)
            })
        }

        fn destroy_targets(&mut self) -> RendererResult<()> {
            self.calls.push("destroy-targets".to_string());
            Ok(())
        }

        fn recreate_swapchain(&mut self) -> RendererResult<()> {
            self.calls.push("recreate".to_string());
            Ok(())
        }

        fn create_targets(&mut self) -> RendererResult<()> {
            self.calls.push("create-targets".to_string());
            Ok(())
        }

        fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
            self.calls.push(format!("record-{}-{}", slot, image_index));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
            self.calls.push(format!("present-{}-{}", slot, image_index));
            Ok(self.present_result)
        }
    }

    fn counter(frames_in_flight: usize) -> FrameCounter {
        FrameCounter::new(0, FrameConfig::new(frames_in_flight).unwrap())
    }

    #[test]
    fn test_normal_frames_rotate_slots() {
        let mut target = MockTarget::new(2);
        let mut counter = counter(2);
        let mut resized = false;

        for _ in 0..3 {
            assert_eq!(run_frame(&mut target, &mut counter, &mut resized).unwrap(), FrameResult::Rendered);
        }

        assert_eq!(counter.frame_id(), 3);
        assert_eq!(
            target.calls,
            vec![
                "wait-0", "acquire-0", "record-0-0", "present-0-0", "wait-1", "acquire-1", "record-1-0", "present-1-0",
                "wait-0", "acquire-0", "record-0-0", "present-0-0",
            ]
        );
        assert!(target.slots.iter().all(|s| *s == SlotState::Idle));
    }

    #[test]
    fn test_out_of_date_acquire_does_not_advance() {
        let mut target = MockTarget::new(2);
        target.acquire_results = vec![AcquireOutcome::OutOfDate];
        let mut counter = counter(2);
        let mut resized = true;

        let result = run_frame(&mut target, &mut counter, &mut resized).unwrap();
        assert_eq!(result, FrameResult::Skipped);
        assert_eq!(counter.frame_id(), 0);
        assert_eq!(target.count("record"), 0);
        assert_eq!(target.count("present"), 0);
        assert_eq!(target.count("recreate"), 1);
        assert!(!resized);
        assert_eq!(target.slots[0], SlotState::Idle);

        // 下一帧仍然使用同一个 slot
        run_frame(&mut target, &mut counter, &mut resized).unwrap();
        assert_eq!(target.calls.last().unwrap(), "present-0-0");
        assert_eq!(counter.frame_id(), 1);
    }

    #[test]
    fn test_suboptimal_present_recreates() {
        let mut target = MockTarget::new(2);
        target.present_result = PresentOutcome::Suboptimal;
        let mut counter = counter(2);
        let mut resized = false;

        run_frame(&mut target, &mut counter, &mut resized).unwrap();
        assert_eq!(target.calls.last().unwrap(), "create-targets");
        assert_eq!(counter.frame_id(), 1);
    }

    #[test]
    fn test_resize_flag_recreates_once() {
        let mut target = MockTarget::new(2);
        let mut counter = counter(2);
        let mut resized = true;

        run_frame(&mut target, &mut counter, &mut resized).unwrap();
        run_frame(&mut target, &mut counter, &mut resized).unwrap();
        assert!(!resized);
        assert_eq!(target.count("recreate"), 1);
    }

    #[test]
    fn test_suboptimal_acquire_still_renders() {
        let mut target = MockTarget::new(1);
        target.acquire_results = vec![AcquireOutcome::Acquired {
            index: 2,
            suboptimal: true,
        }];
        let mut counter = counter(1);
        let mut resized = false;

        assert_eq!(run_frame(&mut target, &mut counter, &mut resized).unwrap(), FrameResult::Rendered);
        assert_eq!(
            target.calls,
            vec!["wait-0", "acquire-0", "record-0-2", "present-0-2", "destroy-targets", "recreate", "create-targets"]
        );
    }

    #[test]
    fn test_minimized_skips() {
        let mut target = MockTarget::new(2);
        target.minimized = true;
        let mut counter = counter(2);
        let mut resized = false;

        assert_eq!(run_frame(&mut target, &mut counter, &mut resized).unwrap(), FrameResult::Skipped);
        assert!(target.calls.is_empty());
        assert_eq!(counter.frame_id(), 0);
    }

    #[test]
    fn test_targets_destroyed_before_swapchain() {
        let mut target = MockTarget::new(2);
        target.acquire_results = vec![AcquireOutcome::OutOfDate];
        let mut counter = counter(2);
        let mut resized = false;

        run_frame(&mut target, &mut counter, &mut resized).unwrap();
        assert_eq!(target.calls, vec!["wait-0", "acquire-0", "destroy-targets", "recreate", "create-targets"]);
    }

    #[test]
    fn test_minimized_during_out_of_date_defers_recreate() {
        let mut target = MockTarget::new(2);
        target.acquire_results = vec![AcquireOutcome::OutOfDate];
        target.minimize_on_acquire = true;
        let mut counter = counter(2);
        let mut resized = false;

        // acquire 过程中窗口被最小化，重建被推迟
        assert_eq!(run_frame(&mut target, &mut counter, &mut resized).unwrap(), FrameResult::Skipped);
        assert_eq!(target.calls, vec!["wait-0", "acquire-0"]);
        assert!(resized);
        assert_eq!(target.slots[0], SlotState::Idle);

        // 最小化期间什么都不做
        target.minimize_on_acquire = false;
        assert_eq!(run_frame(&mut target, &mut counter, &mut resized).unwrap(), FrameResult::Skipped);
        assert_eq!(target.calls.len(), 2);
        assert!(resized);

        // 窗口恢复：正常绘制，present 之后完成推迟的重建
        target.minimized = false;
        assert_eq!(run_frame(&mut target, &mut counter, &mut resized).unwrap(), FrameResult::Rendered);
        assert_eq!(
            target.calls[2..],
            ["wait-0", "acquire-0", "record-0-0", "present-0-0", "destroy-targets", "recreate", "create-targets"]
        );
        assert!(!resized);
        assert_eq!(counter.frame_id(), 1);
    }
}
