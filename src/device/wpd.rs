//! Windows Portable Devices backend
//!
//! Implements the device traits on top of the WPD COM API. Devices are
//! enumerated through `IPortableDeviceManager`; a session walks the device's
//! object tree and reports every non-container object as an item.
//!
//! WPD property mapping:
//! - `WPD_OBJECT_ORIGINAL_FILE_NAME` (or `WPD_OBJECT_NAME`) is split into
//!   `Item Name` and `Filename extension`
//! - `WPD_OBJECT_SIZE` becomes `Item Size`
//! - `WPD_OBJECT_DATE_CREATED`, falling back to `WPD_OBJECT_DATE_MODIFIED`,
//!   becomes `Item Time Stamp` (a `VT_DATE` maps to the date facet, a string
//!   to the textual facet)

use crate::core::error::{IngestError, Result};
use crate::core::metadata::ole_automation_to_datetime;
use crate::device::traits::{
    keys, split_file_name, CaptureDeviceTrait, DeviceCatalogTrait, DeviceItem,
    DeviceSessionTrait, PropertyBag, PropertyValue,
};
use log::{debug, info, trace, warn};
use std::ptr::null_mut;
use std::rc::Rc;
use windows::{
    core::{BSTR, GUID, PCWSTR, PROPVARIANT, PWSTR},
    Win32::{
        Devices::PortableDevices::{
            IEnumPortableDeviceObjectIDs, IPortableDevice, IPortableDeviceContent,
            IPortableDeviceKeyCollection, IPortableDeviceManager, IPortableDeviceProperties,
            IPortableDeviceValues, PortableDeviceFTM, PortableDeviceKeyCollection,
            PortableDeviceManager, PortableDeviceValues, WPD_CLIENT_MAJOR_VERSION,
            WPD_CLIENT_MINOR_VERSION, WPD_CLIENT_NAME, WPD_CLIENT_REVISION,
            WPD_CLIENT_SECURITY_QUALITY_OF_SERVICE, WPD_OBJECT_CONTENT_TYPE,
            WPD_OBJECT_DATE_CREATED, WPD_OBJECT_DATE_MODIFIED, WPD_OBJECT_NAME,
            WPD_OBJECT_ORIGINAL_FILE_NAME, WPD_OBJECT_SIZE, WPD_RESOURCE_DEFAULT,
        },
        System::{
            Com::{
                CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, IStream,
                CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED,
            },
            Variant::{VT_BSTR, VT_DATE, VT_LPWSTR},
        },
        UI::Shell::PropertiesSystem::PROPERTYKEY,
    },
};

/// GUID for folder content type
const WPD_CONTENT_TYPE_FOLDER: GUID = GUID::from_u128(0x27e2e392_a111_48e0_ab0c_e17705a05f85);

/// GUID for functional object content type (storage objects like "Internal Storage")
const WPD_CONTENT_TYPE_FUNCTIONAL_OBJECT: GUID =
    GUID::from_u128(0x99ed0160_17ff_4c44_9d98_1d7a6f941921);

/// Root object id of every WPD device
const WPD_DEVICE_OBJECT_ID: &str = "DEVICE";

/// HRESULT returned when the device refuses the connection
const E_ACCESSDENIED: u32 = 0x80070005;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// RAII guard for COM initialization
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM library
    pub fn new() -> Result<Self> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| IngestError::Com(format!("Failed to initialize COM: {}", e)))?;

            Ok(Self { initialized: true })
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Initialize COM and return a guard that will uninitialize on drop
pub fn initialize_com() -> Result<ComGuard> {
    ComGuard::new()
}

/// The WPD device catalog
pub struct WpdCatalog {
    manager: IPortableDeviceManager,
    // Declared last so COM is torn down after the manager is released
    _com: Rc<ComGuard>,
}

impl WpdCatalog {
    /// Initialize COM and create the device manager
    pub fn new() -> Result<Self> {
        let com = Rc::new(initialize_com()?);
        let manager: IPortableDeviceManager = unsafe {
            CoCreateInstance(&PortableDeviceManager, None, CLSCTX_INPROC_SERVER).map_err(|e| {
                IngestError::DeviceEnumeration(format!("Failed to create device manager: {}", e))
            })?
        };

        Ok(Self { manager, _com: com })
    }

    /// Read one of the manager's per-device strings (friendly name, etc.)
    fn device_string(
        &self,
        device_id: &[u16],
        getter: impl Fn(PCWSTR, PWSTR, *mut u32) -> windows::core::Result<()>,
    ) -> Option<String> {
        let mut length: u32 = 0;
        let _ = getter(PCWSTR(device_id.as_ptr()), PWSTR::null(), &mut length);
        if length == 0 {
            return None;
        }

        let mut buffer: Vec<u16> = vec![0; length as usize];
        getter(
            PCWSTR(device_id.as_ptr()),
            PWSTR(buffer.as_mut_ptr()),
            &mut length,
        )
        .ok()?;

        let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        let value = String::from_utf16_lossy(&buffer[..end]);
        (!value.is_empty()).then_some(value)
    }
}

impl DeviceCatalogTrait for WpdCatalog {
    type Device = WpdDevice;

    fn list_devices(&self) -> Result<Vec<WpdDevice>> {
        unsafe {
            let _ = self.manager.RefreshDeviceList();

            let mut device_count: u32 = 0;
            self.manager
                .GetDevices(null_mut(), &mut device_count)
                .map_err(|e| {
                    IngestError::DeviceEnumeration(format!("Failed to get device count: {}", e))
                })?;

            if device_count == 0 {
                return Ok(Vec::new());
            }

            let mut device_ids: Vec<PWSTR> = vec![PWSTR::null(); device_count as usize];
            self.manager
                .GetDevices(device_ids.as_mut_ptr(), &mut device_count)
                .map_err(|e| {
                    IngestError::DeviceEnumeration(format!("Failed to enumerate devices: {}", e))
                })?;

            let mut devices = Vec::new();

            for device_id_ptr in device_ids.iter().take(device_count as usize) {
                if device_id_ptr.is_null() {
                    continue;
                }

                let device_id = device_id_ptr.to_string().unwrap_or_default();
                CoTaskMemFree(Some(device_id_ptr.0 as *const _));

                let id_wide = wide(&device_id);
                let friendly_name = self.device_string(&id_wide, |id, buf, len| {
                    self.manager.GetDeviceFriendlyName(id, buf, len)
                });
                let manufacturer = self.device_string(&id_wide, |id, buf, len| {
                    self.manager.GetDeviceManufacturer(id, buf, len)
                });
                let description = self.device_string(&id_wide, |id, buf, len| {
                    self.manager.GetDeviceDescription(id, buf, len)
                });

                trace!(
                    "WPD device {}: name={:?} manufacturer={:?} description={:?}",
                    device_id,
                    friendly_name,
                    manufacturer,
                    description
                );

                devices.push(WpdDevice {
                    device_id,
                    friendly_name,
                    manufacturer,
                    description,
                    _com: Rc::clone(&self._com),
                });
            }

            Ok(devices)
        }
    }
}

/// A discovered WPD device
pub struct WpdDevice {
    /// The device ID used by WPD
    pub device_id: String,
    friendly_name: Option<String>,
    manufacturer: Option<String>,
    description: Option<String>,
    _com: Rc<ComGuard>,
}

impl CaptureDeviceTrait for WpdDevice {
    type Session = WpdSession;

    fn property_value(&self, key: &str) -> Result<String> {
        let value = match key {
            keys::NAME => self.friendly_name.as_ref(),
            keys::MANUFACTURER => self.manufacturer.as_ref(),
            keys::DESCRIPTION => self.description.as_ref(),
            _ => None,
        };
        value
            .cloned()
            .ok_or_else(|| IngestError::property_missing(key))
    }

    fn connect(&self) -> Result<WpdSession> {
        let device_name = self
            .friendly_name
            .clone()
            .unwrap_or_else(|| self.device_id.clone());
        let connection_error = |message: String| IngestError::DeviceConnection {
            device: device_name.clone(),
            message,
        };

        unsafe {
            let device: IPortableDevice =
                CoCreateInstance(&PortableDeviceFTM, None, CLSCTX_INPROC_SERVER).map_err(|e| {
                    connection_error(format!("Failed to create device object: {}", e))
                })?;

            let client_info: IPortableDeviceValues =
                CoCreateInstance(&PortableDeviceValues, None, CLSCTX_INPROC_SERVER)
                    .map_err(|e| connection_error(format!("Failed to create client info: {}", e)))?;

            let client_name = wide("Camera Ingest");
            client_info.SetStringValue(&WPD_CLIENT_NAME, PCWSTR(client_name.as_ptr()))?;
            client_info.SetUnsignedIntegerValue(&WPD_CLIENT_MAJOR_VERSION, 1)?;
            client_info.SetUnsignedIntegerValue(&WPD_CLIENT_MINOR_VERSION, 0)?;
            client_info.SetUnsignedIntegerValue(&WPD_CLIENT_REVISION, 0)?;
            client_info
                .SetUnsignedIntegerValue(&WPD_CLIENT_SECURITY_QUALITY_OF_SERVICE, 0x00020000)?;

            let device_id_wide = wide(&self.device_id);
            device
                .Open(PCWSTR(device_id_wide.as_ptr()), &client_info)
                .map_err(|e| {
                    if e.code().0 as u32 == E_ACCESSDENIED {
                        IngestError::AccessDenied
                    } else {
                        connection_error(format!("Failed to open device: {}", e))
                    }
                })?;

            let content = device
                .Content()
                .map_err(|e| connection_error(format!("Failed to get device content: {}", e)))?;

            info!("Opened device: {}", device_name);

            Ok(WpdSession {
                device,
                content,
                _com: Rc::clone(&self._com),
            })
        }
    }
}

/// An open connection to a WPD device
pub struct WpdSession {
    device: IPortableDevice,
    content: IPortableDeviceContent,
    _com: Rc<ComGuard>,
}

impl Drop for WpdSession {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.Close();
        }
    }
}

/// A child object found while walking the device tree
struct WpdObject {
    object_id: String,
    is_container: bool,
    properties: PropertyBag,
}

impl WpdSession {
    fn content_error(message: String) -> IngestError {
        IngestError::DeviceConnection {
            device: "WPD".to_string(),
            message,
        }
    }

    /// Enumerate the direct children of an object
    fn children(
        &self,
        parent_id: &str,
        properties: &IPortableDeviceProperties,
        keys_to_read: &IPortableDeviceKeyCollection,
    ) -> Result<Vec<WpdObject>> {
        trace!("Enumerating children of: {}", parent_id);

        unsafe {
            let parent_id_wide = wide(parent_id);
            let enum_objects: IEnumPortableDeviceObjectIDs = self
                .content
                .EnumObjects(0, PCWSTR(parent_id_wide.as_ptr()), None)
                .map_err(|e| {
                    Self::content_error(format!(
                        "Failed to enumerate objects in '{}': {}",
                        parent_id, e
                    ))
                })?;

            let mut objects = Vec::new();

            loop {
                let mut object_ids: [PWSTR; 100] = [PWSTR::null(); 100];
                let mut fetched: u32 = 0;

                let result = enum_objects.Next(&mut object_ids, &mut fetched as *mut u32);

                if fetched == 0 {
                    break;
                }

                for object_id_ptr in object_ids.iter().take(fetched as usize) {
                    if object_id_ptr.is_null() {
                        continue;
                    }

                    let object_id = object_id_ptr.to_string().unwrap_or_default();
                    CoTaskMemFree(Some(object_id_ptr.0 as *const _));

                    let object_id_wide = wide(&object_id);
                    match properties.GetValues(PCWSTR(object_id_wide.as_ptr()), keys_to_read) {
                        Ok(values) => objects.push(parse_object(&object_id, &values)),
                        Err(e) => {
                            warn!("Failed to get properties for object '{}': {}", object_id, e)
                        }
                    }
                }

                if result.is_err() {
                    break;
                }
            }

            Ok(objects)
        }
    }
}

impl DeviceSessionTrait for WpdSession {
    fn items(&self) -> Result<Vec<DeviceItem>> {
        let (properties, keys_to_read) = unsafe {
            let properties = self
                .content
                .Properties()
                .map_err(|e| Self::content_error(format!("Failed to get properties: {}", e)))?;

            let keys_to_read: IPortableDeviceKeyCollection =
                CoCreateInstance(&PortableDeviceKeyCollection, None, CLSCTX_INPROC_SERVER)
                    .map_err(|e| {
                        Self::content_error(format!("Failed to create key collection: {}", e))
                    })?;

            for key in [
                &WPD_OBJECT_NAME,
                &WPD_OBJECT_ORIGINAL_FILE_NAME,
                &WPD_OBJECT_CONTENT_TYPE,
                &WPD_OBJECT_SIZE,
                &WPD_OBJECT_DATE_CREATED,
                &WPD_OBJECT_DATE_MODIFIED,
            ] {
                keys_to_read.Add(key)?;
            }

            (properties, keys_to_read)
        };

        let mut items = Vec::new();
        let mut pending = vec![WPD_DEVICE_OBJECT_ID.to_string()];

        while let Some(parent_id) = pending.pop() {
            let children = match self.children(&parent_id, &properties, &keys_to_read) {
                Ok(children) => children,
                Err(e) if parent_id == WPD_DEVICE_OBJECT_ID => return Err(e),
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };

            for object in children {
                if object.is_container {
                    pending.push(object.object_id);
                } else {
                    items.push(DeviceItem::new(&object.object_id, object.properties));
                }
            }
        }

        debug!("Found {} item(s) on device", items.len());
        Ok(items)
    }

    fn read_item(&self, item_id: &str) -> Result<Vec<u8>> {
        let transfer_error = |message: String| IngestError::Transfer {
            item: item_id.to_string(),
            message,
        };

        unsafe {
            let resources = self
                .content
                .Transfer()
                .map_err(|e| transfer_error(format!("Failed to get transfer interface: {}", e)))?;

            let object_id_wide = wide(item_id);
            let mut optimal_buffer_size: u32 = 0;
            let mut stream_opt: Option<IStream> = None;

            resources
                .GetStream(
                    PCWSTR(object_id_wide.as_ptr()),
                    &WPD_RESOURCE_DEFAULT,
                    0, // STGM_READ
                    &mut optimal_buffer_size,
                    &mut stream_opt,
                )
                .map_err(|e| transfer_error(format!("Failed to get file stream: {}", e)))?;

            let stream =
                stream_opt.ok_or_else(|| transfer_error("Device returned no stream".to_string()))?;

            let buffer_size = if optimal_buffer_size > 0 && optimal_buffer_size <= 1_048_576 {
                optimal_buffer_size as usize
            } else {
                262_144
            };

            let mut data = Vec::new();
            let mut buffer = vec![0u8; buffer_size];

            loop {
                let mut bytes_read: u32 = 0;
                let result = stream.Read(
                    buffer.as_mut_ptr() as *mut _,
                    buffer_size as u32,
                    Some(&mut bytes_read),
                );

                if let Err(e) = result.ok() {
                    return Err(transfer_error(format!("Stream read failed: {}", e)));
                }
                if bytes_read == 0 {
                    break;
                }

                data.extend_from_slice(&buffer[..bytes_read as usize]);

                if bytes_read < buffer_size as u32 {
                    break;
                }
            }

            Ok(data)
        }
    }
}

/// Map WPD object values onto the pipeline's property bag
fn parse_object(object_id: &str, values: &IPortableDeviceValues) -> WpdObject {
    unsafe {
        let file_name = get_string_value(values, &WPD_OBJECT_ORIGINAL_FILE_NAME)
            .or_else(|| get_string_value(values, &WPD_OBJECT_NAME));

        let is_container = values
            .GetGuidValue(&WPD_OBJECT_CONTENT_TYPE)
            .map(|content_type| {
                content_type == WPD_CONTENT_TYPE_FOLDER
                    || content_type == WPD_CONTENT_TYPE_FUNCTIONAL_OBJECT
            })
            .unwrap_or(false);

        let mut properties = PropertyBag::new();

        if let Some(file_name) = file_name {
            let (name, extension) = split_file_name(&file_name);
            properties.insert(keys::ITEM_NAME, PropertyValue::Text(name));
            if let Some(extension) = extension {
                properties.insert(keys::FILENAME_EXTENSION, PropertyValue::Text(extension));
            }
        }

        if let Ok(size) = values.GetUnsignedLargeIntegerValue(&WPD_OBJECT_SIZE) {
            let size = i64::try_from(size).unwrap_or(i64::MAX);
            properties.insert(keys::ITEM_SIZE, PropertyValue::Integer(size));
        }

        let timestamp = date_value(values, &WPD_OBJECT_DATE_CREATED)
            .or_else(|| date_value(values, &WPD_OBJECT_DATE_MODIFIED));
        if let Some(timestamp) = timestamp {
            properties.insert(keys::ITEM_TIME_STAMP, timestamp);
        }

        WpdObject {
            object_id: object_id.to_string(),
            is_container,
            properties,
        }
    }
}

/// Get a string value from IPortableDeviceValues
unsafe fn get_string_value(values: &IPortableDeviceValues, key: &PROPERTYKEY) -> Option<String> {
    let pwstr = values.GetStringValue(key).ok()?;
    let result = pwstr.to_string().unwrap_or_default();
    CoTaskMemFree(Some(pwstr.0 as *const _));
    (!result.is_empty()).then_some(result)
}

/// Read a date property as either its date or textual facet
unsafe fn date_value(values: &IPortableDeviceValues, key: &PROPERTYKEY) -> Option<PropertyValue> {
    let variant: PROPVARIANT = values.GetValue(key).ok()?;
    let vt = variant.vt();

    if vt == VT_DATE {
        let days = f64::try_from(&variant).ok()?;
        match ole_automation_to_datetime(days) {
            Some(date) => Some(PropertyValue::Date(date)),
            None => Some(PropertyValue::Opaque(format!("VT_DATE {}", days))),
        }
    } else if vt == VT_LPWSTR || vt == VT_BSTR {
        let text = BSTR::try_from(&variant).ok()?;
        Some(PropertyValue::Text(text.to_string()))
    } else {
        Some(PropertyValue::Opaque(format!("VARTYPE {}", vt.0)))
    }
}
