pub use crate::data_structs::align::{
    find_indexes_in_site_list,
    find_overlapping_indexes,
};
pub use crate::data_structs::batch::{
    BulkProfile,
    CpgList,
    ReferenceMatrix,
};
pub use crate::data_structs::records::{
    BulkRecord,
    CellTypeRecord,
    CpgRecord,
    ReferenceRecord,
    SiteKey,
    SiteKeyed,
    TsvRecord,
};
pub use crate::data_structs::typedef::{
    Matrix,
    Proportion,
    RowIndexes,
    Vector,
};
pub use crate::data_structs::SignalType;
pub use crate::io::filters::{
    FilterSet,
    RowFilter,
};
pub use crate::io::tsv::TsvReader;
pub use crate::tools::deconv::{
    DeconvConfig,
    Deconvolver,
    QpStatus,
};
pub use crate::utils::rng::ProfileSampler;
