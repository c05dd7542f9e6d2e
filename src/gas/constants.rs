pub const R_IDEAL_GAS_EQUATION: f32 = 8.31; //kPa*L/(K*mol)
pub const ONE_ATMOSPHERE: f32 = 101.325; //kPa
pub const TCMB: f32 = 2.7; // -270.3degC
pub const T0C: f32 = 273.15; // 0degC
pub const T20C: f32 = 293.15; // 20degC

pub const GAS_MIN_MOLES: f32 = 0.00000005;

pub const MINIMUM_HEAT_CAPACITY: f32 = 0.0003;

pub const CELL_VOLUME: f32 = 2500.0; //liters in a cell
pub const MOLES_CELLSTANDARD: f32 = ONE_ATMOSPHERE * CELL_VOLUME / (T20C * R_IDEAL_GAS_EQUATION); //moles in a 2.5 m^3 cell at 101.325 kPa and 20 degC
pub const O2STANDARD: f32 = 0.21; //percentage of oxygen in a normal mixture of air
pub const N2STANDARD: f32 = 0.79; //same but for nitrogen
pub const MOLES_O2STANDARD: f32 = MOLES_CELLSTANDARD * O2STANDARD; // O2 standard value (21%)
pub const MOLES_N2STANDARD: f32 = MOLES_CELLSTANDARD * N2STANDARD; // N2 standard value (79%)

//EXCITED GROUPS
pub const EXCITED_GROUP_BREAKDOWN_CYCLES: i32 = 4; //number of full ticks before an excited group breaks down (averages gas contents across tiles)
pub const EXCITED_GROUP_DISMANTLE_CYCLES: i32 = 16; //number of full ticks before an excited group dismantles and removes its tiles from active

pub const MINIMUM_AIR_RATIO_TO_SUSPEND: f32 = 0.1; //Ratio of air that must move to/from a tile to reset group processing
pub const MINIMUM_AIR_RATIO_TO_MOVE: f32 = 0.001; //Minimum ratio of air that must move to/from a tile
pub const MINIMUM_AIR_TO_SUSPEND: f32 = MOLES_CELLSTANDARD * MINIMUM_AIR_RATIO_TO_SUSPEND; //Minimum amount of air that has to move before a group processing can be suspended
pub const MINIMUM_MOLES_DELTA_TO_MOVE: f32 = MOLES_CELLSTANDARD * MINIMUM_AIR_RATIO_TO_MOVE; //Minimum mole delta for gas to move between tiles
pub const MINIMUM_TEMPERATURE_DELTA_TO_SUSPEND: f32 = 4.0; //Minimum temperature difference before group processing is suspended
pub const MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER: f32 = 0.5; //Minimum temperature difference before the gas temperatures are just set to be equal

//HEAT TRANSFER COEFFICIENTS
//Must be between 0 and 1. Values closer to 1 equalize temperature faster
//Should not exceed 0.4 else strange heat flow occur
pub const OPEN_HEAT_TRANSFER_COEFFICIENT: f32 = 0.4;

//EQUALIZATION
pub const EQUALIZE_TILE_LIMIT: usize = 100; //soft cap on zone size; tiles beyond it are dropped from the zone
pub const EQUALIZE_HARD_TILE_LIMIT: usize = 200; //hard cap on zone flood fill

//DECOMPRESSION
pub const DECOMPRESSION_RIP_THRESHOLD: f32 = 20.0; //moles vented through a tile before a floor rip is even considered
pub const DECOMPRESSION_RIP_CHANCE_SCALE: f32 = 500.0; //vented moles divided by this gives the rip chance
pub const DECOMPRESSION_RIP_CHANCE_MIN: f32 = 0.005;
pub const DECOMPRESSION_RIP_CHANCE_MAX: f32 = 0.5;

//GASES
pub const MOLES_GAS_VISIBLE: f32 = 0.25; //Moles in a standard cell after which gases are visible

pub const FACTOR_GAS_VISIBLE_MAX: f32 = 20.0; //moles_visible * FACTOR_GAS_VISIBLE_MAX = Moles after which gas is at maximum visibility
pub const MOLES_GAS_VISIBLE_STEP: f32 = 0.25; //Mole step for alpha updates. This means alpha can update at 0.25, 0.5, 0.75 and so on
