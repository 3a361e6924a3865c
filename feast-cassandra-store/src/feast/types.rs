#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Value {
    #[prost(
        oneof = "value::Val",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 11, 12, 13, 14, 15, 16, 17, 18, 19"
    )]
    pub val: ::core::option::Option<value::Val>,
}
/// Nested message and enum types in `Value`.
pub mod value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Val {
        #[prost(bytes = "vec", tag = "1")]
        BytesVal(::prost::alloc::vec::Vec<u8>),
        #[prost(string, tag = "2")]
        StringVal(::prost::alloc::string::String),
        #[prost(int32, tag = "3")]
        Int32Val(i32),
        #[prost(int64, tag = "4")]
        Int64Val(i64),
        #[prost(double, tag = "5")]
        DoubleVal(f64),
        #[prost(float, tag = "6")]
        FloatVal(f32),
        #[prost(bool, tag = "7")]
        BoolVal(bool),
        #[prost(int64, tag = "8")]
        UnixTimestampVal(i64),
        #[prost(message, tag = "11")]
        BytesListVal(super::BytesList),
        #[prost(message, tag = "12")]
        StringListVal(super::StringList),
        #[prost(message, tag = "13")]
        Int32ListVal(super::Int32List),
        #[prost(message, tag = "14")]
        Int64ListVal(super::Int64List),
        #[prost(message, tag = "15")]
        DoubleListVal(super::DoubleList),
        #[prost(message, tag = "16")]
        FloatListVal(super::FloatList),
        #[prost(message, tag = "17")]
        BoolListVal(super::BoolList),
        #[prost(message, tag = "18")]
        UnixTimestampListVal(super::UnixTimestampList),
        #[prost(enumeration = "super::Null", tag = "19")]
        NullVal(i32),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringList {
    #[prost(string, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Int32List {
    #[prost(int32, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<i32>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<i64>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DoubleList {
    #[prost(double, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<f64>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<f32>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BoolList {
    #[prost(bool, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<bool>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnixTimestampList {
    #[prost(int64, repeated, tag = "1")]
    pub val: ::prost::alloc::vec::Vec<i64>,
}
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration
)]
#[repr(i32)]
pub enum Null {
    Null = 0,
}
/// Nested message and enum types in `ValueType`.
pub mod value_type {
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration
    )]
    #[repr(i32)]
    pub enum Enum {
        Invalid = 0,
        Bytes = 1,
        String = 2,
        Int32 = 3,
        Int64 = 4,
        Double = 5,
        Float = 6,
        Bool = 7,
        UnixTimestamp = 8,
        BytesList = 11,
        StringList = 12,
        Int32List = 13,
        Int64List = 14,
        DoubleList = 15,
        FloatList = 16,
        BoolList = 17,
        UnixTimestampList = 18,
        Null = 19,
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntityKey {
    #[prost(string, repeated, tag = "1")]
    pub join_keys: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "2")]
    pub entity_values: ::prost::alloc::vec::Vec<Value>,
}
