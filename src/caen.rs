//! Bus transport backed by the vendor CAENDigitizer library.

#[allow(non_upper_case_globals)]
#[allow(non_camel_case_types)]
#[allow(non_snake_case)]
#[allow(dead_code)]
mod ffi {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

use crate::{BoardHandle, BoardInfo, BusTransport, ConnectionKind, DgtzReturn};
use libc::{c_char, c_int};
use std::ffi::CStr;

fn check(res: ffi::CAEN_DGTZ_ErrorCode) -> Result<(), DgtzReturn> {
    DgtzReturn::check(res as i32)
}

fn c_string(raw: &[c_char]) -> String {
    if !raw.contains(&0) {
        return String::new();
    }
    // SAFETY: the slice holds a NUL terminator, checked above.
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .trim()
        .to_string()
}

/// Transport for boards reached through the vendor library (USB or optical link).
#[derive(Debug, Default, Clone, Copy)]
pub struct CaenTransport;

impl BusTransport for CaenTransport {
    fn open(
        &mut self,
        kind: ConnectionKind,
        device_index: u32,
        link_number: u32,
        address: u32,
    ) -> Result<BoardHandle, DgtzReturn> {
        let mut handle: c_int = 0;
        let res = unsafe {
            ffi::CAEN_DGTZ_OpenDigitizer(
                kind.code() as ffi::CAEN_DGTZ_ConnectionType,
                device_index as c_int,
                link_number as c_int,
                address,
                &mut handle,
            )
        };
        check(res)?;
        Ok(BoardHandle(handle))
    }

    fn close(&mut self, handle: BoardHandle) -> Result<(), DgtzReturn> {
        check(unsafe { ffi::CAEN_DGTZ_CloseDigitizer(handle.0) })
    }

    fn write_register(
        &mut self,
        handle: BoardHandle,
        address: u32,
        value: u32,
    ) -> Result<(), DgtzReturn> {
        check(unsafe { ffi::CAEN_DGTZ_WriteRegister(handle.0, address, value) })
    }

    fn read_register(&mut self, handle: BoardHandle, address: u32) -> Result<u32, DgtzReturn> {
        let mut value: u32 = 0;
        check(unsafe { ffi::CAEN_DGTZ_ReadRegister(handle.0, address, &mut value) })?;
        Ok(value)
    }

    fn board_info(&mut self, handle: BoardHandle) -> Result<BoardInfo, DgtzReturn> {
        // SAFETY: plain C struct of integers and char arrays; all-zero is valid.
        let mut info: ffi::CAEN_DGTZ_BoardInfo_t = unsafe { std::mem::zeroed() };
        check(unsafe { ffi::CAEN_DGTZ_GetInfo(handle.0, &mut info) })?;
        Ok(BoardInfo {
            model_name: c_string(&info.ModelName),
            channels: info.Channels,
            adc_bits: info.ADC_NBits,
            roc_firmware: c_string(&info.ROC_FirmwareRel),
            amc_firmware: c_string(&info.AMC_FirmwareRel),
            serial_number: info.SerialNumber,
        })
    }
}
