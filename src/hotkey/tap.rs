//! Raw CGEventTap plumbing for macOS
//!
//! The tap is created through `CGEventTapCreate` directly: the wrapper in
//! core-graphics has no NSSystemDefined event type, and its callback hands
//! the original event back when asked to drop it.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[allow(deprecated)]
use cocoa::appkit::NSEvent;
#[allow(deprecated)]
use cocoa::base::{id, nil};
#[allow(deprecated)]
use cocoa::foundation::NSAutoreleasePool;
use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEventField, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventTapProxy,
    CGEventType, EventField,
};
use tracing::{error, info, warn};

use crate::detector::PanicDetector;

use super::keys::{media, Key};
use super::listener::{HotkeyError, TapResponse};

type CGEventRef = *mut c_void;
type CGEventMask = u64;

/// Event types arrive as raw `u32`s since NSSystemDefined is not a `CGEventType`
type TapCallback =
    unsafe extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: TapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

    fn CGEventGetIntegerValueField(event: CGEventRef, field: CGEventField) -> i64;
}

const KEY_DOWN: u32 = CGEventType::KeyDown as u32;
const TAP_DISABLED_BY_TIMEOUT: u32 = CGEventType::TapDisabledByTimeout as u32;
const TAP_DISABLED_BY_USER_INPUT: u32 = CGEventType::TapDisabledByUserInput as u32;

/// State reachable from the tap callback; only touched on the listener thread
struct TapContext {
    detector: RefCell<PanicDetector>,
    clock: Instant,
    /// The tap's own port, set once created, for re-enabling
    port: Cell<CFMachPortRef>,
}

/// Run the CFRunLoop with the event tap until `running` is cleared
pub(super) fn run_event_loop(
    detector: PanicDetector,
    running: Arc<AtomicBool>,
) -> Result<(), HotkeyError> {
    let context = Box::new(TapContext {
        detector: RefCell::new(detector),
        clock: Instant::now(),
        port: Cell::new(ptr::null_mut()),
    });
    let user_info = &*context as *const TapContext as *mut c_void;

    let event_mask: CGEventMask = (1 << KEY_DOWN as u64) | (1 << media::NX_SYSDEFINED as u64);

    // Active tap: a null return from the callback swallows the event
    let tap_ref = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            event_mask,
            tap_callback,
            user_info,
        )
    };
    if tap_ref.is_null() {
        error!("failed to create event tap - is Accessibility permission granted?");
        return Err(HotkeyError::EventTapCreation);
    }

    let mach_port = unsafe { CFMachPort::wrap_under_create_rule(tap_ref) };
    context.port.set(mach_port.as_concrete_TypeRef());

    let run_loop_source = mach_port
        .create_runloop_source(0)
        .map_err(|_| HotkeyError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        CGEventTapEnable(mach_port.as_concrete_TypeRef(), true);
    }

    info!("event tap created and enabled");

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
        }
    }

    unsafe {
        CGEventTapEnable(mach_port.as_concrete_TypeRef(), false);
        run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    // The context must outlive the tap
    drop(run_loop_source);
    drop(mach_port);
    drop(context);

    Ok(())
}

/// CGEventTap callback - must be fast and non-blocking
unsafe extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    let context = &*(user_info as *const TapContext);

    let key = match event_type {
        KEY_DOWN => {
            let code = CGEventGetIntegerValueField(event, EventField::KEYBOARD_EVENT_KEYCODE);
            Some(Key::from_keycode(code as u16))
        }
        media::NX_SYSDEFINED => system_defined_key(event),
        TAP_DISABLED_BY_TIMEOUT | TAP_DISABLED_BY_USER_INPUT => {
            warn!(event_type, "event tap disabled, re-enabling");
            let port = context.port.get();
            if !port.is_null() {
                CGEventTapEnable(port, true);
            }
            None
        }
        _ => None,
    };

    let Some(key) = key else {
        return event;
    };

    let now_ms = context.clock.elapsed().as_millis() as u64;
    let disposition = context.detector.borrow_mut().handle_key_down(key, now_ms);

    match TapResponse::from(disposition) {
        TapResponse::Forward => event,
        TapResponse::Drop => ptr::null_mut(),
    }
}

/// Read subtype and data1 of an NSSystemDefined event through AppKit
#[allow(deprecated)]
unsafe fn system_defined_key(event: CGEventRef) -> Option<Key> {
    let pool = NSAutoreleasePool::new(nil);

    let ns_event: id = NSEvent::eventWithCGEvent_(nil, event);
    let key = if ns_event == nil {
        None
    } else {
        let subtype = NSEvent::subtype(ns_event) as i16;
        let data1 = NSEvent::data1(ns_event) as i64;
        Key::from_system_defined(subtype, data1)
    };

    pool.drain();
    key
}
