#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl MonitorRect {
    pub fn contains(&self, point: (i32, i32)) -> bool {
        point.0 >= self.x
            && point.0 < self.x + self.width
            && point.1 >= self.y
            && point.1 < self.y + self.height
    }

    /// Pull a point inside this rectangle. Used so a badge anchored near a
    /// screen edge never renders off-screen.
    pub fn clamp(&self, point: (i32, i32)) -> (i32, i32) {
        (
            point.0.clamp(self.x, self.x + self.width - 1),
            point.1.clamp(self.y, self.y + self.height - 1),
        )
    }
}

pub fn monitor_containing(monitors: &[MonitorRect], point: (i32, i32)) -> Option<MonitorRect> {
    monitors.iter().copied().find(|rect| rect.contains(point))
}

/// Enumerate the work areas of all attached displays. Secondary displays to
/// the left of or above the primary have negative origins.
pub fn enumerate_work_areas() -> Vec<MonitorRect> {
    #[cfg(windows)]
    {
        platform::enumerate_work_areas()
    }

    #[cfg(not(windows))]
    {
        Vec::new()
    }
}

#[cfg(windows)]
mod platform {
    use super::MonitorRect;
    use std::mem;
    use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW,
    };

    pub fn enumerate_work_areas() -> Vec<MonitorRect> {
        unsafe extern "system" fn enum_proc(
            monitor: HMONITOR,
            _hdc: HDC,
            _rect: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            let monitors = unsafe { &mut *(data.0 as *mut Vec<MonitorRect>) };
            let mut info = MONITORINFOEXW::default();
            info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;
            if unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut _ as *mut _) }
                .as_bool()
            {
                let rc = info.monitorInfo.rcWork;
                monitors.push(MonitorRect {
                    x: rc.left,
                    y: rc.top,
                    width: rc.right - rc.left,
                    height: rc.bottom - rc.top,
                });
            }
            BOOL(1)
        }

        let mut monitors = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_proc),
                LPARAM(&mut monitors as *mut Vec<MonitorRect> as isize),
            );
        }
        monitors
    }
}
