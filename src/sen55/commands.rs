use crate::frame::Cmd;

// Measurement control
pub const START_MEASUREMENT: Cmd = [0x00, 0x21];
pub const START_MEASUREMENT_WITHOUT_PM: Cmd = [0x00, 0x37]; // gas and RH/T only, laser stays off
pub const STOP_MEASUREMENT: Cmd = [0x01, 0x04];
pub const READ_DATA_READY_FLAG: Cmd = [0x02, 0x02];
pub const READ_MEASURED_VALUES: Cmd = [0x03, 0xc4];
pub const READ_MEASURED_PM_VALUES: Cmd = [0x04, 0x13]; // undocumented, SPS30-compatible layout

// Fan cleaning
pub const START_FAN_CLEANING: Cmd = [0x56, 0x07];
pub const AUTO_CLEANING_INTERVAL: Cmd = [0x80, 0x04];

// Algorithm parameters, read/write under the same command
pub const TEMPERATURE_COMPENSATION: Cmd = [0x60, 0xb2];
pub const WARM_START_PARAMETER: Cmd = [0x60, 0xc6];
pub const VOC_TUNING_PARAMETERS: Cmd = [0x60, 0xd0];
pub const NOX_TUNING_PARAMETERS: Cmd = [0x60, 0xe1];
pub const RHT_ACCELERATION_MODE: Cmd = [0x60, 0xf7];
pub const VOC_ALGORITHM_STATE: Cmd = [0x61, 0x81];

// Device information and health
pub const READ_PRODUCT_NAME: Cmd = [0xd0, 0x14];
pub const READ_SERIAL_NUMBER: Cmd = [0xd0, 0x33];
pub const READ_VERSION: Cmd = [0xd1, 0x00];
pub const READ_DEVICE_STATUS: Cmd = [0xd2, 0x06];
pub const CLEAR_DEVICE_STATUS: Cmd = [0xd2, 0x10];
pub const RESET: Cmd = [0xd3, 0x04];
